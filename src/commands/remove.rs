use std::path::Path;

use crate::error::{Result, TickError};
use crate::output::{self, Format};

pub fn run(
    base: &Path,
    position: Option<usize>,
    matching: Option<String>,
    format: Format,
) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    let removed = match (position, matching) {
        (Some(position), None) => tracker.remove(position)?,
        (None, Some(description)) => tracker.remove_matching(&description)?,
        _ => {
            return Err(TickError::Validation {
                op: "remove",
                reason: "give either a position or --matching".into(),
            });
        }
    };
    output::print_task(&removed, format)
}
