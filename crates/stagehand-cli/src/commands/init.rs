use std::path::Path;

use anyhow::{Context, Result};

/// Execute the `init` command: create a fresh state directory.
pub fn execute(state_dir: &Path) -> Result<()> {
    stagehand_store::init_store(state_dir)
        .with_context(|| format!("initializing state directory '{}'", state_dir.display()))?;
    println!("{}", state_dir.display());
    Ok(())
}
