use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};

pub fn run(
    base: &Path,
    tag: Option<String>,
    completed: bool,
    pending: bool,
    history: bool,
    format: Format,
) -> Result<()> {
    let (workspace, tracker) = super::open_tracker(base)?;

    let mut tasks = if history {
        match workspace.history_log() {
            Some(log) => log.read(tracker.now())?.records,
            None => vec![],
        }
    } else {
        tracker.list_tasks()
    };

    if completed {
        tasks.retain(|t| t.completed);
    }
    if pending {
        tasks.retain(|t| !t.completed);
    }
    if let Some(ref tg) = tag {
        tasks.retain(|t| t.tags.contains(tg));
    }

    output::print_tasks(&tasks, format)
}
