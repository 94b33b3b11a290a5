use std::path::Path;

use crate::error::Result;
use crate::workspace::Workspace;

pub fn run(base: &Path) -> Result<()> {
    let workspace = Workspace::init(base)?;
    eprintln!("Initialized {} in {}", crate::workspace::DIR_NAME, base.display());
    tracing::debug!(root = %workspace.root().display(), "workspace created");
    Ok(())
}
