//! Line format of the task file.
//!
//! One task per line, fields separated by `;`:
//!
//! ```text
//! description;completed;createdAtMillis;completedAtMillisOrNull;tag1,tag2;priority
//! ```
//!
//! Older files carry only `description;completed;completedAtMillisOrNull`
//! (or just the first two fields); those still load.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::model::{FIELD_DELIMITER, Priority, TAG_DELIMITER, TaskRecord, parse_tags};

const NULL: &str = "null";
const MIN_FIELDS: usize = 2;
const CANONICAL_FIELDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct MalformedRecord {
    pub line: usize,
    pub reason: String,
}

pub fn encode(record: &TaskRecord) -> String {
    let completed_at = match (record.completed, record.completed_at) {
        (true, Some(at)) => at.timestamp_millis().to_string(),
        _ => NULL.to_string(),
    };
    let tags = record.tags.join(TAG_DELIMITER.to_string().as_str());
    [
        record.description.clone(),
        record.completed.to_string(),
        record.created_at.timestamp_millis().to_string(),
        completed_at,
        tags,
        record.priority.to_string(),
    ]
    .join(FIELD_DELIMITER.to_string().as_str())
}

/// Decode one line. `line` is the 1-based line number used in errors and
/// `fallback_created` stands in for a creation time legacy lines lack.
pub fn decode(
    text: &str,
    line: usize,
    fallback_created: DateTime<Utc>,
) -> Result<TaskRecord, MalformedRecord> {
    let malformed = |reason: String| MalformedRecord { line, reason };
    let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_FIELDS {
        return Err(malformed(format!(
            "expected at least {MIN_FIELDS} fields, found {}",
            fields.len()
        )));
    }
    if fields.len() > CANONICAL_FIELDS {
        return Err(malformed(format!(
            "expected at most {CANONICAL_FIELDS} fields, found {}",
            fields.len()
        )));
    }

    let description = fields[0].trim();
    if description.is_empty() {
        return Err(malformed("empty description".into()));
    }
    let completed = match fields[1].trim() {
        "true" => true,
        "false" => false,
        other => return Err(malformed(format!("invalid completion flag '{other}'"))),
    };

    let (created_at, completed_at) = if fields.len() <= 3 {
        let completed_at = match fields.get(2) {
            Some(raw) => parse_millis(raw).map_err(malformed)?,
            None => None,
        };
        (completed_at.unwrap_or(fallback_created), completed_at)
    } else {
        let created_at = parse_millis(fields[2])
            .map_err(malformed)?
            .ok_or_else(|| malformed("creation time must not be null".into()))?;
        (created_at, parse_millis(fields[3]).map_err(malformed)?)
    };

    let tags = fields.get(4).map(|raw| parse_tags(raw)).unwrap_or_default();
    let priority = match fields.get(5) {
        Some(raw) => {
            let value: u8 = raw
                .trim()
                .parse()
                .map_err(|_| malformed(format!("invalid priority '{}'", raw.trim())))?;
            Priority::new(value).map_err(|e| malformed(e.to_string()))?
        }
        None => Priority::default(),
    };

    // Completion needs a timestamp; a flagged line without one loads as pending.
    let completed_at = if completed { completed_at } else { None };
    Ok(TaskRecord {
        position: 0,
        description: description.to_string(),
        completed: completed_at.is_some(),
        created_at,
        completed_at,
        tags,
        priority,
    })
}

fn parse_millis(raw: &str) -> Result<Option<DateTime<Utc>>, String> {
    let raw = raw.trim();
    if raw == NULL {
        return Ok(None);
    }
    let millis: i64 = raw
        .parse()
        .map_err(|_| format!("invalid timestamp '{raw}'"))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(Some)
        .ok_or_else(|| format!("timestamp {millis} out of range"))
}
