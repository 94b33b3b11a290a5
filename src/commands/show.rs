use std::path::Path;

use crate::error::{Result, TickError};
use crate::output::{self, Format};

pub fn run(base: &Path, position: usize, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    let task = tracker.task(position).ok_or(TickError::OutOfRange {
        op: "show",
        position,
        len: tracker.len(),
    })?;
    output::print_task(&task, format)
}
