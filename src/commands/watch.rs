use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::parse_time;
use crate::error::{Result, TickError};
use crate::output::{self, Format};
use crate::rollover::{
    self, DEFAULT_POLL, RolloverAction, RolloverScheduler, Schedule, ShutdownOutcome,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the daily rollover in the foreground until Ctrl+C.
pub fn run(
    base: &Path,
    at: Option<String>,
    action: Option<RolloverAction>,
    format: Format,
) -> Result<()> {
    let (workspace, tracker) = super::open_tracker(base)?;
    let config = &workspace.config().rollover;
    let at = match at {
        Some(raw) => parse_time(&raw)?,
        None => config.time()?,
    };
    let action = action.unwrap_or(config.action);

    let tracker = Arc::new(tracker);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let schedule = Schedule::new(at, &clock.now().with_timezone(&Local));
    eprintln!(
        "Rollover ({action}) daily at {}; next at {}. Press Ctrl+C to stop.",
        at.format("%H:%M"),
        schedule.next_fire().with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );

    tracker.subscribe_progress(move |p| {
        let _ = output::print_progress(&p, format);
    });

    let mut act = rollover::rollover_handler(Arc::clone(&tracker), action, Local, move |summary| {
        let _ = output::print_summary(summary, format);
    });
    // Other invocations may have edited the file since we loaded it.
    let reloading = Arc::clone(&tracker);
    let handler = move |fired_at: DateTime<Utc>| {
        if let Err(e) = reloading.reload() {
            tracing::warn!(error = %e, "could not reload tasks before rollover");
        }
        act(fired_at);
    };

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| TickError::Io(std::io::Error::other(format!("failed to register Ctrl+C handler: {e}"))))?;

    let scheduler = RolloverScheduler::start(schedule, clock, DEFAULT_POLL, handler);
    let _ = stop_rx.recv();

    eprintln!("Stopping rollover...");
    if scheduler.shutdown(SHUTDOWN_TIMEOUT) == ShutdownOutcome::TimedOut {
        eprintln!("warning: rollover still running after {SHUTDOWN_TIMEOUT:?}; exiting anyway");
    }
    Ok(())
}
