use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};

pub fn toggle(base: &Path, position: usize, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    tracker.toggle_completion(position)?;
    if let Some(task) = tracker.task(position) {
        output::print_task(&task, format)?;
    }
    Ok(())
}

pub fn clear(base: &Path, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    let removed = tracker.clear_completed()?;
    output::print_count("removed", removed, format)
}

pub fn finalize(base: &Path, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    let removed = tracker.finalize_day()?;
    match format {
        Format::Pretty if removed.is_empty() => println!("Nothing completed to close out."),
        Format::Pretty => println!("Day finalized: {} completed task(s) archived.", removed.len()),
        _ => output::print_tasks(&removed, format)?,
    }
    Ok(())
}
