pub mod component;
pub mod flow;
pub mod init;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use stagehand_engine::Orchestrator;

use crate::docker::DockerCli;

/// Open the orchestrator against the state directory, wired to the local
/// docker CLI.
pub(crate) fn open_orchestrator(state_dir: &Path) -> Result<Orchestrator> {
    Orchestrator::open(state_dir, Arc::new(DockerCli))
        .with_context(|| format!("opening state directory '{}'", state_dir.display()))
}

/// Print one record as a JSON line on stdout.
pub(crate) fn print_json<T: serde::Serialize>(record: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(record).context("encoding record as JSON")?
    );
    Ok(())
}
