use chrono::{DateTime, Utc};

use crate::error::{Result, TickError};
use crate::model::{self, Priority, TaskId, TaskRecord};
use crate::store::completion::CompletionIndex;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    id: TaskId,
    description: String,
    created_at: DateTime<Utc>,
    tags: Vec<String>,
    priority: Priority,
}

/// Ordered task list plus its completion index.
///
/// Every method leaves the two structures consistent; validation and range
/// errors are raised before anything is touched.
#[derive(Debug, Default, Clone)]
pub struct TaskStore {
    entries: Vec<Entry>,
    completions: CompletionIndex,
    next_id: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from loaded records. Ids are assigned in file order.
    pub fn from_records(records: Vec<TaskRecord>) -> Self {
        let mut store = Self::new();
        for mut record in records {
            record.normalize();
            let id = store.allocate_id();
            if let (true, Some(at)) = (record.completed, record.completed_at) {
                store.completions.mark(id, at);
            }
            store.entries.push(Entry {
                id,
                description: record.description,
                created_at: record.created_at,
                tags: record.tags,
                priority: record.priority,
            });
        }
        store
    }

    fn allocate_id(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    fn check(&self, op: &'static str, position: usize) -> Result<()> {
        if position < self.entries.len() {
            Ok(())
        } else {
            Err(TickError::OutOfRange {
                op,
                position,
                len: self.entries.len(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.completions.count()
    }

    pub fn id_at(&self, position: usize) -> Option<TaskId> {
        self.entries.get(position).map(|e| e.id)
    }

    pub fn is_completed(&self, position: usize) -> bool {
        self.id_at(position)
            .is_some_and(|id| self.completions.is_completed(id))
    }

    pub fn completed_at(&self, position: usize) -> Option<DateTime<Utc>> {
        self.id_at(position)
            .and_then(|id| self.completions.completed_at(id))
    }

    pub fn add(
        &mut self,
        description: &str,
        tags: Vec<String>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let description = model::clean_description("add", description)?;
        let tags = model::clean_tags("add", tags)?;
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            description,
            created_at: now,
            tags,
            priority,
        });
        Ok(self.entries.len() - 1)
    }

    pub fn remove(&mut self, position: usize) -> Result<TaskRecord> {
        self.check("remove", position)?;
        let record = self.record_at(position);
        let entry = self.entries.remove(position);
        self.completions.unmark(entry.id);
        Ok(record)
    }

    /// Position of the first task whose description equals the trimmed `description`.
    pub fn find(&self, description: &str) -> Option<usize> {
        let needle = description.trim();
        self.entries.iter().position(|e| e.description == needle)
    }

    pub fn update(&mut self, position: usize, description: &str) -> Result<()> {
        self.check("update", position)?;
        let description = model::clean_description("update", description)?;
        self.entries[position].description = description;
        Ok(())
    }

    /// Flip completion of the task at `position`. Returns the new completion time.
    pub fn toggle(&mut self, position: usize, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        self.check("toggle", position)?;
        let id = self.entries[position].id;
        Ok(self.completions.toggle(id, now))
    }

    /// Move a task. Returns false when `from == to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<bool> {
        self.check("reorder", from)?;
        self.check("reorder", to)?;
        if from == to {
            return Ok(false);
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        Ok(true)
    }

    /// Remove every completed task, returning them in their former order.
    pub fn take_completed(&mut self) -> Vec<TaskRecord> {
        if self.completions.count() == 0 {
            return Vec::new();
        }
        let taken: Vec<TaskRecord> = (0..self.entries.len())
            .filter(|&p| self.is_completed(p))
            .map(|p| self.record_at(p))
            .collect();
        let completions = &self.completions;
        self.entries.retain(|e| !completions.is_completed(e.id));
        self.completions = CompletionIndex::new();
        taken
    }

    pub fn record(&self, position: usize) -> Option<TaskRecord> {
        (position < self.entries.len()).then(|| self.record_at(position))
    }

    pub fn records(&self) -> Vec<TaskRecord> {
        (0..self.entries.len()).map(|p| self.record_at(p)).collect()
    }

    fn record_at(&self, position: usize) -> TaskRecord {
        let entry = &self.entries[position];
        let completed_at = self.completions.completed_at(entry.id);
        TaskRecord {
            position,
            description: entry.description.clone(),
            completed: completed_at.is_some(),
            created_at: entry.created_at,
            completed_at,
            tags: entry.tags.clone(),
            priority: entry.priority,
        }
    }
}
