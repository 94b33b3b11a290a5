use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};

pub fn run(base: &Path, position: usize, description: String, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    tracker.update(position, &description)?;
    if let Some(task) = tracker.task(position) {
        output::print_task(&task, format)?;
    }
    Ok(())
}
