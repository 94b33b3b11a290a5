use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, TickError};
use crate::model::TaskRecord;
use crate::store::codec;
use crate::store::files::{LoadReport, parse_lines};

/// Append-only archive of tasks closed out at the end of a day.
/// Uses the same line format as the task file.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, records: &[TaskRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TickError::persistence("archive", &self.path, e))?;
        let mut buf = String::new();
        for record in records {
            buf.push_str(&codec::encode(record));
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| TickError::persistence("archive", &self.path, e))?;
        tracing::debug!(path = %self.path.display(), archived = records.len(), "archived tasks");
        Ok(())
    }

    pub fn read(&self, now: DateTime<Utc>) -> Result<LoadReport> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(parse_lines(&content, now)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LoadReport::default()),
            Err(e) => Err(TickError::persistence("load", &self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn done(description: &str, ms: i64) -> TaskRecord {
        let at = Utc.timestamp_millis_opt(ms).unwrap();
        TaskRecord {
            position: 0,
            description: description.into(),
            completed: true,
            created_at: at,
            completed_at: Some(at),
            tags: vec![],
            priority: Priority::default(),
        }
    }

    #[test]
    fn appends_across_calls() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt"));

        log.append(&[done("A", 1)]).unwrap();
        log.append(&[done("B", 2), done("C", 3)]).unwrap();
        log.append(&[]).unwrap();

        let report = log.read(Utc::now()).unwrap();
        let names: Vec<_> = report.records.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(report.records.iter().all(|r| r.completed));
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("history.txt"));
        assert!(log.read(Utc::now()).unwrap().records.is_empty());
    }
}
