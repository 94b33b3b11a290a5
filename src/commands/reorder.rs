use std::path::Path;

use crate::error::Result;
use crate::output::{self, Format};

pub fn run(base: &Path, from: usize, to: usize, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    tracker.reorder(from, to)?;
    output::print_tasks(&tracker.list_tasks(), format)
}
