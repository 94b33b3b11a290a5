use std::path::Path;

use chrono::Local;

use crate::error::Result;
use crate::output::{self, Format};

pub fn run(base: &Path, format: Format) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    output::print_summary(&tracker.daily_summary(&Local), format)
}
