use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TickError};

/// Field separator of the task file. Not allowed inside descriptions or tags.
pub const FIELD_DELIMITER: char = ';';
/// Separator between tags inside the tags field.
pub const TAG_DELIMITER: char = ',';

/// Stable identity of a task for the lifetime of a tracker session.
///
/// Positions change on every remove and reorder; ids never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task priority, 1 being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGH: Priority = Priority(1);
    pub const MEDIUM: Priority = Priority(2);
    pub const LOW: Priority = Priority(3);
    pub const MAX: u8 = 9;

    pub fn new(value: u8) -> Result<Self> {
        if (1..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TickError::validation(
                "priority",
                format!("priority must be between 1 and {}, got {value}", Self::MAX),
            ))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn label(self) -> String {
        match self.0 {
            1 => "high".to_string(),
            2 => "medium".to_string(),
            3 => "low".to_string(),
            n => format!("priority {n}"),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MEDIUM
    }
}

impl TryFrom<u8> for Priority {
    type Error = TickError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> u8 {
        p.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one task as handed to renderers and the task file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub position: usize,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub priority: Priority,
}

impl TaskRecord {
    /// Trim whitespace and drop empty tags, keeping the caller's order.
    pub fn normalize(&mut self) {
        self.description = self.description.trim().to_string();
        self.tags = normalize_tags(std::mem::take(&mut self.tags));
        if !self.completed {
            self.completed_at = None;
        }
    }
}

/// Validate and trim a task description for operation `op`.
pub fn clean_description(op: &'static str, raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TickError::validation(op, "description must not be empty"));
    }
    if trimmed.contains(FIELD_DELIMITER) {
        return Err(TickError::validation(
            op,
            format!("description '{trimmed}' must not contain '{FIELD_DELIMITER}'"),
        ));
    }
    if trimmed.contains(['\n', '\r']) {
        return Err(TickError::validation(
            op,
            "description must fit on a single line",
        ));
    }
    Ok(trimmed.to_string())
}

/// Trim tags, drop empty ones and reject reserved characters.
pub fn clean_tags(op: &'static str, tags: Vec<String>) -> Result<Vec<String>> {
    let tags = normalize_tags(tags);
    if let Some(bad) = tags
        .iter()
        .find(|t| t.contains([FIELD_DELIMITER, TAG_DELIMITER, '\n', '\r']))
    {
        return Err(TickError::validation(
            op,
            format!("tag '{bad}' contains a reserved character"),
        ));
    }
    Ok(tags)
}

/// Split a comma-separated tag string as typed into the original tag field.
pub fn parse_tags(input: &str) -> Vec<String> {
    normalize_tags(input.split(TAG_DELIMITER).map(str::to_string).collect())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
