use std::path::Path;

use crate::error::Result;
use crate::model::{Priority, parse_tags};
use crate::output::{self, Format};

pub fn run(
    base: &Path,
    description: String,
    tags: Vec<String>,
    priority: Option<u8>,
    format: Format,
) -> Result<()> {
    let (_, tracker) = super::open_tracker(base)?;
    let priority = priority.map(Priority::new).transpose()?;
    let tags = tags.iter().flat_map(|t| parse_tags(t)).collect();

    let position = tracker.add(&description, tags, priority)?;
    if let Some(task) = tracker.task(position) {
        output::print_task(&task, format)?;
    }
    Ok(())
}
