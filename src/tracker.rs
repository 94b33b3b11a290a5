//! The task engine: owns the list and its completion index, writes every
//! change through to the task file and tells progress subscribers about it.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};

use crate::clock::Clock;
use crate::error::{Result, TickError};
use crate::model::{Priority, TaskRecord};
use crate::progress::{Progress, ProgressReporter, SubscriberId};
use crate::rollover::DailySummary;
use crate::store::files::{LoadReport, SaveGuard, TaskFile};
use crate::store::history::HistoryLog;
use crate::store::tasks::TaskStore;

struct Persistence {
    file: Option<TaskFile>,
    history: Option<HistoryLog>,
    dirty: bool,
}

/// Single-writer task engine.
///
/// Mutations serialize on the persistence mutex and hold the state write
/// lock only while touching memory, so readers never see the list and the
/// completion index disagree. Progress callbacks run while the writer is
/// still held and must not call mutating methods.
pub struct Tracker {
    state: RwLock<TaskStore>,
    writer: Mutex<Persistence>,
    clock: Arc<dyn Clock>,
    progress: ProgressReporter,
    default_priority: Priority,
}

impl Tracker {
    /// A tracker that never touches disk.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::with_store(TaskStore::new(), None, clock)
    }

    /// Load `file` and track it. Malformed lines are skipped and listed in the report.
    pub fn open(file: TaskFile, clock: Arc<dyn Clock>) -> Result<(Self, LoadReport)> {
        let report = file.load(clock.now())?;
        let store = TaskStore::from_records(report.records.clone());
        tracing::debug!(
            path = %file.path().display(),
            tasks = store.len(),
            completed = store.completed_count(),
            "opened task file"
        );
        Ok((Self::with_store(store, Some(file), clock), report))
    }

    fn with_store(store: TaskStore, file: Option<TaskFile>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(store),
            writer: Mutex::new(Persistence {
                file,
                history: None,
                dirty: false,
            }),
            clock,
            progress: ProgressReporter::new(),
            default_priority: Priority::default(),
        }
    }

    /// Archive finalized tasks to `history`.
    pub fn with_history(self, history: HistoryLog) -> Self {
        self.writer.lock().history = Some(history);
        self
    }

    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---- reads ----

    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.state.read().records()
    }

    pub fn task(&self, position: usize) -> Option<TaskRecord> {
        self.state.read().record(position)
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.state.read().completed_count()
    }

    pub fn is_completed(&self, position: usize) -> bool {
        self.state.read().is_completed(position)
    }

    pub fn completed_at(&self, position: usize) -> Option<DateTime<Utc>> {
        self.state.read().completed_at(position)
    }

    pub fn progress(&self) -> Progress {
        let store = self.state.read();
        Progress::new(store.completed_count(), store.len())
    }

    /// True when the last save failed and memory is ahead of disk.
    pub fn is_dirty(&self) -> bool {
        self.writer.lock().dirty
    }

    /// Tasks completed on the current calendar day in `tz`.
    pub fn daily_summary<Tz: TimeZone>(&self, tz: &Tz) -> DailySummary {
        let now = self.clock.now().with_timezone(tz);
        DailySummary::for_day(now.date_naive(), tz, &self.list_tasks())
    }

    // ---- progress subscriptions ----

    pub fn subscribe_progress(
        &self,
        callback: impl Fn(Progress) + Send + Sync + 'static,
    ) -> SubscriberId {
        self.progress.subscribe(callback)
    }

    pub fn unsubscribe_progress(&self, id: SubscriberId) -> bool {
        self.progress.unsubscribe(id)
    }

    // ---- mutations ----

    pub fn add(&self, description: &str, tags: Vec<String>, priority: Option<Priority>) -> Result<usize> {
        let priority = priority.unwrap_or(self.default_priority);
        self.commit("add", true, |store, now| store.add(description, tags, priority, now))
    }

    pub fn remove(&self, position: usize) -> Result<TaskRecord> {
        self.commit("remove", true, |store, _| store.remove(position))
    }

    /// Remove the first task whose description matches `description`.
    pub fn remove_matching(&self, description: &str) -> Result<TaskRecord> {
        self.commit("remove", true, |store, _| {
            let position = store
                .find(description)
                .ok_or_else(|| TickError::TaskNotFound(description.trim().to_string()))?;
            store.remove(position)
        })
    }

    pub fn update(&self, position: usize, description: &str) -> Result<()> {
        self.commit("update", false, |store, _| store.update(position, description))
    }

    /// Flip completion. Returns the new completion time, `None` when reopened.
    pub fn toggle_completion(&self, position: usize) -> Result<Option<DateTime<Utc>>> {
        self.commit("toggle", true, |store, now| store.toggle(position, now))
    }

    pub fn reorder(&self, from: usize, to: usize) -> Result<()> {
        let mut writer = self.writer.lock();
        let now = self.clock.now();
        let snapshot = {
            let mut store = self.state.write();
            if !store.reorder(from, to)? {
                return Ok(());
            }
            store.records()
        };
        Self::persist(&mut writer, "reorder", &snapshot, now, None)
    }

    /// Remove every completed task. Nothing is written when none are completed.
    pub fn clear_completed(&self) -> Result<usize> {
        let mut writer = self.writer.lock();
        let removed = self.take_completed(&mut writer, "clear", None)?;
        Ok(removed.len())
    }

    /// Close out the day: archive completed tasks to the history log, then
    /// remove them. Pending tasks stay on the list.
    ///
    /// The task file stays locked from the archive through the save, so a
    /// file busy elsewhere fails here before anything is archived.
    pub fn finalize_day(&self) -> Result<Vec<TaskRecord>> {
        let mut writer = self.writer.lock();
        let done: Vec<TaskRecord> = self
            .state
            .read()
            .records()
            .into_iter()
            .filter(|r| r.completed)
            .collect();
        if done.is_empty() {
            return Ok(done);
        }
        let file = writer.file.clone();
        let guard = file.as_ref().map(TaskFile::lock).transpose()?;
        if let Some(history) = &writer.history {
            history.append(&done)?;
        }
        self.take_completed(&mut writer, "finalize", guard.as_ref())
    }

    /// Write the current state again, e.g. after a failed save.
    pub fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let now = self.clock.now();
        let snapshot = self.state.read().records();
        Self::persist(&mut writer, "flush", &snapshot, now, None)
    }

    /// Replace memory with the file's contents.
    pub fn reload(&self) -> Result<LoadReport> {
        let writer = self.writer.lock();
        let Some(file) = &writer.file else {
            return Ok(LoadReport::default());
        };
        let report = file.load(self.clock.now())?;
        let progress = {
            let mut store = self.state.write();
            *store = TaskStore::from_records(report.records.clone());
            Progress::new(store.completed_count(), store.len())
        };
        self.progress.broadcast(progress);
        Ok(report)
    }

    fn take_completed(
        &self,
        writer: &mut Persistence,
        op: &'static str,
        held: Option<&SaveGuard<'_>>,
    ) -> Result<Vec<TaskRecord>> {
        let now = self.clock.now();
        let (removed, snapshot, progress) = {
            let mut store = self.state.write();
            let removed = store.take_completed();
            if removed.is_empty() {
                return Ok(removed);
            }
            let progress = Progress::new(store.completed_count(), store.len());
            (removed, store.records(), progress)
        };
        let saved = Self::persist(writer, op, &snapshot, now, held);
        self.progress.broadcast(progress);
        saved.map(|()| removed)
    }

    /// Apply `change` under the writer, persist, and notify when counts may move.
    /// A failed save is returned after the change has already taken effect.
    fn commit<T>(
        &self,
        op: &'static str,
        notify: bool,
        change: impl FnOnce(&mut TaskStore, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let mut writer = self.writer.lock();
        let now = self.clock.now();
        let (value, snapshot, progress) = {
            let mut store = self.state.write();
            let value = change(&mut *store, now)?;
            let progress = Progress::new(store.completed_count(), store.len());
            (value, store.records(), progress)
        };
        let saved = Self::persist(&mut writer, op, &snapshot, now, None);
        if notify {
            self.progress.broadcast(progress);
        }
        saved.map(|()| value)
    }

    /// Save `snapshot`, through `held` when the caller already has the file lock.
    fn persist(
        writer: &mut Persistence,
        op: &'static str,
        snapshot: &[TaskRecord],
        now: DateTime<Utc>,
        held: Option<&SaveGuard<'_>>,
    ) -> Result<()> {
        let saved = match (held, &writer.file) {
            (Some(guard), _) => guard.save(snapshot, now),
            (None, Some(file)) => file.save(snapshot, now),
            (None, None) => return Ok(()),
        };
        match saved {
            Ok(_) => {
                writer.dirty = false;
                Ok(())
            }
            Err(e) => {
                writer.dirty = true;
                tracing::warn!(op, error = %e, "could not persist tasks; in-memory state kept");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("tasks", &self.len())
            .field("progress", &self.progress)
            .finish()
    }
}
