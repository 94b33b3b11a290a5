//! Daily rollover: a background timer that once a day either clears the
//! completed tasks or produces a summary of what got done.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::ValueEnum;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::model::TaskRecord;
use crate::tracker::Tracker;

/// What happens when the daily boundary is reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum RolloverAction {
    #[default]
    ClearCompleted,
    Summary,
}

impl std::fmt::Display for RolloverAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClearCompleted => write!(f, "clear_completed"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

/// Tasks completed on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub completed: Vec<String>,
}

impl DailySummary {
    pub fn for_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz, records: &[TaskRecord]) -> Self {
        let completed = records
            .iter()
            .filter(|r| {
                r.completed_at
                    .is_some_and(|at| at.with_timezone(tz).date_naive() == date)
            })
            .map(|r| r.description.clone())
            .collect();
        Self { date, completed }
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

impl std::fmt::Display for DailySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Completed today:")?;
        for description in &self.completed {
            writeln!(f, " ‣ {description}")?;
        }
        Ok(())
    }
}

/// First instant strictly after `now` whose wall-clock time in `now`'s zone is `at`.
pub fn next_fire<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    // A boundary exists within two days unless the calendar runs out.
    for _ in 0..3 {
        if let Some(candidate) = local_at(&tz, date, at)
            && candidate > *now
        {
            return candidate;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    now.clone() + Duration::days(1)
}

fn local_at<Tz: TimeZone>(tz: &Tz, date: NaiveDate, at: NaiveTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(at);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // Skipped by a DST jump; fire once the clocks have moved on.
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest(),
    }
}

/// When the next rollover is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    at: NaiveTime,
    next: DateTime<Utc>,
}

impl Schedule {
    pub fn new<Tz: TimeZone>(at: NaiveTime, now: &DateTime<Tz>) -> Self {
        Self {
            at,
            next: next_fire(now, at).with_timezone(&Utc),
        }
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    pub fn next_fire(&self) -> DateTime<Utc> {
        self.next
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next
    }

    /// Move to the boundary 24 hours after the one that just fired. Boundaries
    /// that already passed while nobody was watching are skipped, not replayed.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.next += Duration::hours(24);
        while self.next <= now {
            self.next += Duration::hours(24);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    Idle { next_fire: DateTime<Utc> },
    Firing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Stopped,
    /// The in-flight fire outlived the timeout; the worker was detached.
    TimedOut,
}

/// Default upper bound on how long the worker sleeps between clock checks.
pub const DEFAULT_POLL: StdDuration = StdDuration::from_secs(30);
const DROP_SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Worker thread that runs a handler at every schedule boundary until shut down.
pub struct RolloverScheduler {
    state: Arc<Mutex<SchedulerState>>,
    fires: Arc<AtomicU64>,
    stopping: Arc<AtomicBool>,
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RolloverScheduler {
    /// Spawn the worker. `poll` caps each sleep so clock jumps are noticed.
    pub fn start(
        mut schedule: Schedule,
        clock: Arc<dyn Clock>,
        poll: StdDuration,
        mut handler: impl FnMut(DateTime<Utc>) + Send + 'static,
    ) -> Self {
        let state = Arc::new(Mutex::new(SchedulerState::Idle {
            next_fire: schedule.next_fire(),
        }));
        let fires = Arc::new(AtomicU64::new(0));
        let stopping = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let worker_state = Arc::clone(&state);
        let worker_fires = Arc::clone(&fires);
        let worker_stopping = Arc::clone(&stopping);
        tracing::info!(next_fire = %schedule.next_fire(), "rollover scheduled");

        let handle = thread::spawn(move || {
            loop {
                if worker_stopping.load(Ordering::SeqCst) {
                    break;
                }
                let now = clock.now();
                if schedule.is_due(now) {
                    *worker_state.lock() = SchedulerState::Firing;
                    tracing::info!(scheduled = %schedule.next_fire(), "rollover firing");
                    if panic::catch_unwind(AssertUnwindSafe(|| handler(now))).is_err() {
                        tracing::error!("rollover handler panicked");
                    }
                    schedule.advance(now);
                    *worker_state.lock() = SchedulerState::Idle {
                        next_fire: schedule.next_fire(),
                    };
                    worker_fires.fetch_add(1, Ordering::SeqCst);
                    tracing::info!(next_fire = %schedule.next_fire(), "rollover rescheduled");
                    continue;
                }
                let wait = (schedule.next_fire() - now)
                    .to_std()
                    .unwrap_or(StdDuration::ZERO)
                    .min(poll);
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            *worker_state.lock() = SchedulerState::Stopped;
            let _ = done_tx.send(());
        });

        Self {
            state,
            fires,
            stopping,
            stop_tx,
            done_rx,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state.lock().clone()
    }

    pub fn fire_count(&self) -> u64 {
        self.fires.load(Ordering::SeqCst)
    }

    /// Stop firing. Waits up to `timeout` for an in-flight fire to finish,
    /// then leaves the worker behind.
    pub fn shutdown(mut self, timeout: StdDuration) -> ShutdownOutcome {
        self.stop(timeout)
    }

    fn stop(&mut self, timeout: StdDuration) -> ShutdownOutcome {
        let Some(handle) = self.handle.take() else {
            return ShutdownOutcome::Stopped;
        };
        self.stopping.store(true, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    tracing::warn!("rollover worker panicked");
                }
                ShutdownOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(?timeout, "rollover worker still busy; detaching");
                ShutdownOutcome::TimedOut
            }
        }
    }
}

impl Drop for RolloverScheduler {
    fn drop(&mut self) {
        self.stop(DROP_SHUTDOWN_TIMEOUT);
    }
}

/// Handler that performs `action` against `tracker` like any other caller.
/// Summaries are computed for the calendar day in `tz` and passed to `on_summary`.
pub fn rollover_handler<Tz>(
    tracker: Arc<Tracker>,
    action: RolloverAction,
    tz: Tz,
    on_summary: impl Fn(&DailySummary) + Send + 'static,
) -> impl FnMut(DateTime<Utc>) + Send + 'static
where
    Tz: TimeZone + Send + 'static,
{
    move |_fired_at| match action {
        RolloverAction::ClearCompleted => match tracker.clear_completed() {
            Ok(removed) => tracing::info!(removed, "rollover cleared completed tasks"),
            Err(e) => tracing::warn!(error = %e, "rollover could not clear completed tasks"),
        },
        RolloverAction::Summary => {
            let summary = tracker.daily_summary(&tz);
            tracing::info!(completed = summary.completed.len(), "rollover summary ready");
            on_summary(&summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Priority;
    use chrono::FixedOffset;
    use std::time::Instant;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + StdDuration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(StdDuration::from_millis(5));
        }
        false
    }

    #[test]
    fn next_fire_is_today_when_still_ahead() {
        let now = utc(2026, 6, 1, 9, 0);
        assert_eq!(next_fire(&now, time(10, 10)), utc(2026, 6, 1, 10, 10));
    }

    #[test]
    fn next_fire_is_tomorrow_when_passed_or_equal() {
        let now = utc(2026, 6, 1, 11, 0);
        assert_eq!(next_fire(&now, time(10, 10)), utc(2026, 6, 2, 10, 10));
        let exact = utc(2026, 6, 1, 10, 10);
        assert_eq!(next_fire(&exact, time(10, 10)), utc(2026, 6, 2, 10, 10));
    }

    #[test]
    fn next_fire_uses_local_wall_clock() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        // 06:30 UTC is 09:30 at +03:00, so 10:00 local is still ahead.
        let now = utc(2026, 6, 1, 6, 30).with_timezone(&tz);
        assert_eq!(
            next_fire(&now, time(10, 0)).with_timezone(&Utc),
            utc(2026, 6, 1, 7, 0)
        );
    }

    #[test]
    fn advance_skips_missed_boundaries() {
        let mut schedule = Schedule::new(time(22, 0), &utc(2026, 6, 1, 12, 0));
        assert_eq!(schedule.next_fire(), utc(2026, 6, 1, 22, 0));

        schedule.advance(utc(2026, 6, 1, 22, 0));
        assert_eq!(schedule.next_fire(), utc(2026, 6, 2, 22, 0));

        // Woke up three days late: fire once, then only the next future boundary.
        schedule.advance(utc(2026, 6, 5, 9, 0));
        assert_eq!(schedule.next_fire(), utc(2026, 6, 5, 22, 0));
    }

    #[test]
    fn summary_renders_bullets() {
        let summary = DailySummary {
            date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            completed: vec!["Buy milk".into(), "Walk dog".into()],
        };
        assert_eq!(
            summary.to_string(),
            "Completed today:\n ‣ Buy milk\n ‣ Walk dog\n"
        );
    }

    #[test]
    fn scheduler_fires_once_per_boundary_and_stops() {
        let clock = ManualClock::new(utc(2026, 6, 1, 21, 59));
        let schedule = Schedule::new(time(22, 0), &clock.now());
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);

        let scheduler = RolloverScheduler::start(
            schedule,
            Arc::new(clock.clone()),
            StdDuration::from_millis(5),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        thread::sleep(StdDuration::from_millis(30));
        assert_eq!(scheduler.fire_count(), 0);

        clock.set(utc(2026, 6, 1, 22, 0));
        assert!(wait_until(|| scheduler.fire_count() == 1));
        assert_eq!(
            scheduler.state(),
            SchedulerState::Idle {
                next_fire: utc(2026, 6, 2, 22, 0)
            }
        );

        assert_eq!(scheduler.shutdown(StdDuration::from_secs(1)), ShutdownOutcome::Stopped);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_is_bounded_when_fire_is_slow() {
        let clock = ManualClock::new(utc(2026, 6, 1, 22, 0));
        let schedule = Schedule::new(time(22, 0), &utc(2026, 6, 1, 21, 0));
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);

        let scheduler = RolloverScheduler::start(
            schedule,
            Arc::new(clock),
            StdDuration::from_millis(5),
            move |_| {
                flag.store(true, Ordering::SeqCst);
                thread::sleep(StdDuration::from_millis(500));
            },
        );
        assert!(wait_until(|| started.load(Ordering::SeqCst)));

        let begun = Instant::now();
        assert_eq!(
            scheduler.shutdown(StdDuration::from_millis(50)),
            ShutdownOutcome::TimedOut
        );
        assert!(begun.elapsed() < StdDuration::from_millis(400));
    }

    #[test]
    fn clear_handler_goes_through_tracker() {
        let clock = ManualClock::new(utc(2026, 6, 1, 8, 0));
        let tracker = Arc::new(Tracker::in_memory(Arc::new(clock)));
        tracker.add("Done", vec![], Some(Priority::HIGH)).unwrap();
        tracker.add("Open", vec![], None).unwrap();
        tracker.toggle_completion(0).unwrap();

        let mut handler = rollover_handler(
            Arc::clone(&tracker),
            RolloverAction::ClearCompleted,
            Utc,
            |_| {},
        );
        handler(utc(2026, 6, 1, 22, 0));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.completed_count(), 0);
    }

    #[test]
    fn summary_handler_reports_and_keeps_tasks() {
        let clock = ManualClock::new(utc(2026, 6, 1, 8, 0));
        let tracker = Arc::new(Tracker::in_memory(Arc::new(clock)));
        tracker.add("Pay bills", vec![], None).unwrap();
        tracker.toggle_completion(0).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut handler = rollover_handler(
            Arc::clone(&tracker),
            RolloverAction::Summary,
            Utc,
            move |s: &DailySummary| *sink.lock() = Some(s.clone()),
        );
        handler(utc(2026, 6, 1, 22, 0));

        let summary = seen.lock().clone().unwrap();
        assert_eq!(summary.completed, vec!["Pay bills"]);
        assert_eq!(tracker.len(), 1);
    }
}
