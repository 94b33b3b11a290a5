use std::path::Path;
use std::sync::Arc;

use crate::clock::SystemClock;
use crate::error::Result;
use crate::tracker::Tracker;
use crate::workspace::Workspace;

pub mod add;
pub mod edit;
pub mod init;
pub mod lifecycle;
pub mod list;
pub mod progress;
pub mod remove;
pub mod reorder;
pub mod show;
pub mod summary;
pub mod watch;

/// Open the workspace under `base` and load its tasks.
pub(crate) fn open_tracker(base: &Path) -> Result<(Workspace, Tracker)> {
    let workspace = Workspace::open(base)?;
    let (tracker, report) = workspace.open_tracker(Arc::new(SystemClock))?;
    if !report.warnings.is_empty() {
        eprintln!(
            "warning: skipped {} malformed line(s) in {}",
            report.warnings.len(),
            workspace.task_file().path().display()
        );
    }
    Ok((workspace, tracker))
}
