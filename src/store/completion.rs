use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::TaskId;

/// Sparse map from task identity to the moment it was completed.
///
/// A task is completed exactly when its id has an entry here.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompletionIndex {
    entries: HashMap<TaskId, DateTime<Utc>>,
}

impl CompletionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_completed(&self, id: TaskId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn completed_at(&self, id: TaskId) -> Option<DateTime<Utc>> {
        self.entries.get(&id).copied()
    }

    pub fn mark(&mut self, id: TaskId, at: DateTime<Utc>) {
        self.entries.insert(id, at);
    }

    /// Remove the entry for `id`, returning its completion time if it had one.
    pub fn unmark(&mut self, id: TaskId) -> Option<DateTime<Utc>> {
        self.entries.remove(&id)
    }

    /// Flip completion for `id`. Returns the new completion time, `None` when reopened.
    pub fn toggle(&mut self, id: TaskId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.entries.remove(&id).is_some() {
            None
        } else {
            self.entries.insert(id, now);
            Some(now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut index = CompletionIndex::new();
        let id = TaskId(4);

        assert_eq!(index.toggle(id, at(10)), Some(at(10)));
        assert!(index.is_completed(id));
        assert_eq!(index.completed_at(id), Some(at(10)));

        assert_eq!(index.toggle(id, at(20)), None);
        assert!(!index.is_completed(id));
        assert_eq!(index.count(), 0);
    }

    #[test]
    fn unmark_only_touches_the_given_id() {
        let mut index = CompletionIndex::new();
        index.mark(TaskId(1), at(1));
        index.mark(TaskId(2), at(2));

        assert_eq!(index.unmark(TaskId(1)), Some(at(1)));
        assert_eq!(index.unmark(TaskId(1)), None);
        assert!(index.is_completed(TaskId(2)));
        assert_eq!(index.count(), 1);
    }
}
