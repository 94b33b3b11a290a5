use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, TickError};
use crate::model::TaskRecord;
use crate::store::codec::{self, MalformedRecord};
use crate::store::lock;

/// Result of reading a task file: the records that parsed and the lines that didn't.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    pub records: Vec<TaskRecord>,
    pub warnings: Vec<MalformedRecord>,
}

/// Where timestamped copies of the task file go before each save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPolicy {
    pub dir: PathBuf,
    /// Number of backups to retain; 0 keeps all of them.
    pub keep: usize,
}

/// Held lock on a [`TaskFile`]. Saves made through it don't lock again;
/// the lock is released on drop.
#[derive(Debug)]
pub struct SaveGuard<'a> {
    file: &'a TaskFile,
    _lock: File,
}

impl SaveGuard<'_> {
    pub fn save(&self, records: &[TaskRecord], now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        self.file.write_locked(records, now)
    }
}

/// The line-oriented task file on disk.
#[derive(Debug, Clone)]
pub struct TaskFile {
    path: PathBuf,
    lock_path: PathBuf,
    backups: Option<BackupPolicy>,
}

impl TaskFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            backups: None,
        }
    }

    pub fn with_backups(mut self, policy: BackupPolicy) -> Self {
        self.backups = Some(policy);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every task. A missing file is an empty list; bad lines are skipped
    /// and reported, never fatal.
    pub fn load(&self, now: DateTime<Utc>) -> Result<LoadReport> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadReport::default()),
            Err(e) => return Err(TickError::persistence("load", &self.path, e)),
        };
        let report = parse_lines(&content, now);
        if !report.warnings.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                skipped = report.warnings.len(),
                loaded = report.records.len(),
                "skipped malformed task lines"
            );
        }
        Ok(report)
    }

    /// Take the file's advisory lock. Fails fast with `Locked` when another
    /// process holds it.
    pub fn lock(&self) -> Result<SaveGuard<'_>> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| TickError::persistence("save", parent, e))?;
        }
        let lock = lock::acquire_lock("save", &self.lock_path)?;
        Ok(SaveGuard { file: self, _lock: lock })
    }

    /// Back up the current file, then replace it with `records`.
    /// Returns the backup path when one was written.
    pub fn save(&self, records: &[TaskRecord], now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        self.lock()?.save(records, now)
    }

    fn write_locked(&self, records: &[TaskRecord], now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        let backup = self.backup(now)?;

        let tmp = self.path.with_extension("tmp");
        write_lines(&tmp, records).map_err(|e| TickError::persistence("save", &tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| TickError::persistence("save", &self.path, e))?;
        tracing::debug!(path = %self.path.display(), tasks = records.len(), "saved tasks");

        if backup.is_some() {
            self.prune_backups();
        }
        Ok(backup)
    }

    fn backup(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
        let Some(policy) = &self.backups else {
            return Ok(None);
        };
        if !self.path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(&policy.dir)
            .map_err(|e| TickError::persistence("backup", &policy.dir, e))?;

        // Fixed-width sequence so names sort oldest first within one instant.
        let stamp = now.format("%Y%m%d-%H%M%S%3f");
        let name = self.file_name();
        let mut n: u32 = 0;
        let mut target = policy.dir.join(format!("{stamp}-{n:04}-{name}"));
        while target.exists() {
            n += 1;
            target = policy.dir.join(format!("{stamp}-{n:04}-{name}"));
        }
        fs::copy(&self.path, &target).map_err(|e| TickError::persistence("backup", &target, e))?;
        Ok(Some(target))
    }

    /// Backups of this file, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        let Some(policy) = &self.backups else {
            return Ok(vec![]);
        };
        let suffix = format!("-{}", self.file_name());
        let mut found = Vec::new();
        let entries = match fs::read_dir(&policy.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(&suffix) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    fn prune_backups(&self) {
        let Some(policy) = &self.backups else {
            return;
        };
        if policy.keep == 0 {
            return;
        }
        let backups = match self.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                tracing::warn!(error = %e, "could not list backups for pruning");
                return;
            }
        };
        let excess = backups.len().saturating_sub(policy.keep);
        for old in backups.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&old) {
                tracing::warn!(path = %old.display(), error = %e, "could not remove old backup");
            }
        }
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tasks.txt".to_string())
    }
}

pub(crate) fn parse_lines(content: &str, now: DateTime<Utc>) -> LoadReport {
    let mut report = LoadReport::default();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match codec::decode(line, i + 1, now) {
            Ok(mut record) => {
                record.position = report.records.len();
                report.records.push(record);
            }
            Err(bad) => {
                tracing::warn!(line = bad.line, reason = %bad.reason, "malformed task line");
                report.warnings.push(bad);
            }
        }
    }
    report
}

fn write_lines(path: &Path, records: &[TaskRecord]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    for record in records {
        writeln!(file, "{}", codec::encode(record))?;
    }
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn record(description: &str, completed_at: Option<i64>) -> TaskRecord {
        TaskRecord {
            position: 0,
            description: description.into(),
            completed: completed_at.is_some(),
            created_at: at(100),
            completed_at: completed_at.map(at),
            tags: vec![],
            priority: Priority::default(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt"));
        let report = file.load(at(0)).unwrap();
        assert!(report.records.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn save_then_load_round_trips_and_numbers_positions() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt"));
        let records = vec![record("A", Some(500)), record("B", None)];

        assert_eq!(file.save(&records, at(0)).unwrap(), None);
        let report = file.load(at(0)).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].position, 1);
        assert_eq!(report.records[0].completed_at, Some(at(500)));
        assert!(!dir.path().join("tasks.tmp").exists());
    }

    #[test]
    fn malformed_line_is_skipped_with_warning() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.txt");
        fs::write(&path, "Buy milk;false;1;null;;2\njunk\n\n").unwrap();

        let report = TaskFile::new(&path).load(at(0)).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].line, 2);
    }

    #[test]
    fn backup_is_written_only_when_primary_exists() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt")).with_backups(BackupPolicy {
            dir: dir.path().join("backups"),
            keep: 0,
        });

        assert!(file.save(&[record("A", None)], at(0)).unwrap().is_none());

        let stamp = Utc.with_ymd_and_hms(2026, 5, 4, 21, 30, 15).unwrap();
        let backup = file.save(&[record("B", None)], stamp).unwrap().unwrap();
        assert_eq!(
            backup.file_name().unwrap().to_string_lossy(),
            "20260504-213015000-0000-tasks.txt"
        );
        let saved = fs::read_to_string(&backup).unwrap();
        assert!(saved.starts_with("A;false"));
    }

    #[test]
    fn same_instant_backups_do_not_overwrite_each_other() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt")).with_backups(BackupPolicy {
            dir: dir.path().join("backups"),
            keep: 0,
        });
        for name in ["A", "B", "C"] {
            file.save(&[record(name, None)], at(0)).unwrap();
        }
        assert_eq!(file.list_backups().unwrap().len(), 2);
    }

    #[test]
    fn pruning_same_instant_backups_keeps_the_newest() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt")).with_backups(BackupPolicy {
            dir: dir.path().join("backups"),
            keep: 1,
        });
        for name in ["A", "B", "C"] {
            file.save(&[record(name, None)], at(0)).unwrap();
        }

        let backups = file.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        let kept = fs::read_to_string(&backups[0]).unwrap();
        assert!(kept.starts_with("B;false"), "kept {kept:?}");
    }

    #[test]
    fn backup_sequence_sorts_numerically() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt")).with_backups(BackupPolicy {
            dir: dir.path().join("backups"),
            keep: 0,
        });
        for i in 0..12 {
            file.save(&[record(&format!("T{i}"), None)], at(0)).unwrap();
        }

        let backups = file.list_backups().unwrap();
        assert_eq!(backups.len(), 11);
        let last = fs::read_to_string(backups.last().unwrap()).unwrap();
        assert!(last.starts_with("T10;false"), "last {last:?}");
    }

    #[test]
    fn old_backups_are_pruned() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt")).with_backups(BackupPolicy {
            dir: dir.path().join("backups"),
            keep: 2,
        });
        let start = at(1_000_000);
        for i in 0..5 {
            file.save(&[record("A", None)], start + Duration::seconds(i))
                .unwrap();
        }
        let backups = file.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        let newest = backups[1].file_name().unwrap().to_string_lossy().into_owned();
        assert!(newest.starts_with("19700101-001644000"));
    }

    #[test]
    fn save_fails_fast_while_locked() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt"));
        let _held = lock::acquire_lock("save", &dir.path().join("tasks.lock")).unwrap();

        let err = file.save(&[record("A", None)], at(0)).unwrap_err();
        assert!(matches!(err, TickError::Locked { op: "save", .. }));
        assert!(!dir.path().join("tasks.txt").exists());
    }

    #[test]
    fn guard_saves_while_holding_the_lock() {
        let dir = tempdir().unwrap();
        let file = TaskFile::new(dir.path().join("tasks.txt"));

        let guard = file.lock().unwrap();
        assert!(matches!(
            file.save(&[record("A", None)], at(0)),
            Err(TickError::Locked { .. })
        ));
        guard.save(&[record("B", None)], at(0)).unwrap();
        drop(guard);

        let report = file.load(at(0)).unwrap();
        assert_eq!(report.records[0].description, "B");
        file.save(&[record("C", None)], at(0)).unwrap();
    }
}
