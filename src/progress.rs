//! Completion percentage and the subscribers that want to hear about it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of how much of the list is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            completed,
            total,
            percent: percent(completed, total),
        }
    }
}

/// `completed * 100 / total`, truncated; 0 for an empty list.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = completed.min(total) * 100 / total;
    value as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback = Arc<dyn Fn(Progress) + Send + Sync>;

#[derive(Default)]
pub struct ProgressReporter {
    subscribers: Mutex<Vec<(SubscriberId, Callback)>>,
    next_id: AtomicU64,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(Progress) + Send + Sync + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `progress` to every subscriber. A panicking subscriber is
    /// logged and skipped. Returns how many subscribers failed.
    pub fn broadcast(&self, progress: Progress) -> usize {
        // Callbacks run without the list locked so they may (un)subscribe.
        let subs: Vec<(SubscriberId, Callback)> = self.subscribers.lock().clone();
        let mut failed = 0;
        for (id, callback) in subs {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(progress))).is_err() {
                failed += 1;
                tracing::warn!(subscriber = id.0, percent = progress.percent, "progress subscriber panicked");
            }
        }
        failed
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn percent_truncates_and_guards_empty() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 66);
        assert_eq!(percent(3, 3), 100);
    }

    #[test]
    fn subscribers_receive_broadcasts_until_unsubscribed() {
        let reporter = ProgressReporter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = reporter.subscribe(move |p| sink.lock().push(p.percent));

        reporter.broadcast(Progress::new(1, 2));
        assert!(reporter.unsubscribe(id));
        assert!(!reporter.unsubscribe(id));
        reporter.broadcast(Progress::new(2, 2));

        assert_eq!(*seen.lock(), vec![50]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let reporter = ProgressReporter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        reporter.subscribe(|_| panic!("renderer exploded"));
        let counter = Arc::clone(&hits);
        reporter.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(reporter.broadcast(Progress::new(0, 1)), 1);
        assert_eq!(reporter.broadcast(Progress::new(1, 1)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(reporter.subscriber_count(), 2);
    }
}
