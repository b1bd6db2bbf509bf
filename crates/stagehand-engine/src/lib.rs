//! Orchestration core for stagehand.
//!
//! Turns registered components and flows into running containers: parses
//! and materializes specifications, schedules flow steps into parallel-safe
//! stages, drives image builds, and supervises per-stage container
//! execution while persisting metadata through
//! [`stagehand_store::MetadataStore`]. The container engine itself sits
//! behind the [`ContainerDriver`] trait so tests can inject fakes.

pub(crate) mod build;
pub mod driver;
pub mod errors;
pub(crate) mod execute;
pub mod host;
pub mod orchestrator;
pub mod pack;
pub mod spec;
pub mod stages;
pub mod subst;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export public API for convenience
pub use driver::{
    ContainerConfig, ContainerDriver, ContainerMount, ContainerState, ImageBuildOptions,
};
pub use errors::{EngineError, StepFailure};
pub use host::Host;
pub use orchestrator::Orchestrator;

/// Run a blocking closure on the blocking thread pool, folding a task panic
/// into [`EngineError::Internal`].
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Internal(anyhow::anyhow!("blocking task panicked: {e}")))?
}
