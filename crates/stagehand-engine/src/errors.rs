//! Engine error model.
//!
//! Spec-level and store-level errors pass through transparently; the engine
//! adds the lookup, resource, driver, and composite kinds. Driver causes are
//! opaque (`anyhow::Error`); the engine records *which* build, execution,
//! or step failed and leaves the how to the driver's message.

use std::collections::BTreeMap;
use std::path::PathBuf;

use stagehand_store::StoreError;
use stagehand_types::id::{BuildId, ComponentId, ExecutionId, StepName};
use stagehand_types::record::ExecutionRecord;
use stagehand_types::SpecError;

/// One failed step within a failing stage.
#[derive(Debug)]
pub struct StepFailure {
    pub step: StepName,
    pub error: Box<EngineError>,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step '{}': {}", self.step, self.error)
    }
}

fn join_failures(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(StepFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the orchestration core.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Specification parse/validation/materialization failure.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Metadata store failure, including single-row lookup misses and
    /// persistence errors.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A flow step's component has no recorded build.
    #[error("no build recorded for component '{0}'")]
    NoBuildForComponent(ComponentId),

    /// A mountpoint the component requires was not bound by the caller.
    #[error("no mount bound for required mountpoint '{0}'")]
    RequiredMountMissing(String),

    /// The build context directory could not be packaged.
    #[error("failed to package build context '{}': {source}", .path.display())]
    ContextPackagingFailed {
        path: PathBuf,
        source: anyhow::Error,
    },

    /// The container engine rejected or aborted the image build.
    #[error("image build '{build_id}' failed: {source}")]
    ImageBuildFailed {
        build_id: BuildId,
        source: anyhow::Error,
    },

    /// The container engine could not create the container.
    #[error("creating container for execution '{execution_id}' failed: {source}")]
    ContainerCreateFailed {
        execution_id: ExecutionId,
        source: anyhow::Error,
    },

    /// The container engine could not start the created container.
    #[error("starting container for execution '{execution_id}' failed: {source}")]
    ContainerStartFailed {
        execution_id: ExecutionId,
        source: anyhow::Error,
    },

    /// Waiting for the container to leave the running state failed
    /// (including a cancelled wait).
    #[error("waiting on container for execution '{execution_id}' failed: {source}")]
    ContainerWaitFailed {
        execution_id: ExecutionId,
        source: anyhow::Error,
    },

    /// A step's container exited with a non-zero code.
    #[error("step '{step}' exited with non-zero code {code}")]
    NonZeroExit { step: StepName, code: i64 },

    /// One or more steps of a stage failed. Carries every started
    /// execution of the flow so callers can inspect the containers, which
    /// are left in place.
    #[error("stage {stage_index} failed: {}", join_failures(.failures))]
    StageFailed {
        stage_index: usize,
        failures: Vec<StepFailure>,
        executions: BTreeMap<StepName, ExecutionRecord>,
    },

    /// Infrastructure failure (blocking task panic, poisoned lock, output
    /// sink error).
    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failed_enumerates_steps_and_codes() {
        let err = EngineError::StageFailed {
            stage_index: 1,
            failures: vec![
                StepFailure {
                    step: StepName::new("transform"),
                    error: Box::new(EngineError::NonZeroExit {
                        step: StepName::new("transform"),
                        code: 2,
                    }),
                },
                StepFailure {
                    step: StepName::new("load"),
                    error: Box::new(EngineError::NonZeroExit {
                        step: StepName::new("load"),
                        code: 137,
                    }),
                },
            ],
            executions: BTreeMap::new(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stage 1"));
        assert!(msg.contains("transform"));
        assert!(msg.contains("code 2"));
        assert!(msg.contains("load"));
        assert!(msg.contains("code 137"));
    }

    #[test]
    fn spec_errors_pass_through_transparently() {
        let err = EngineError::from(SpecError::CyclicDependency);
        assert_eq!(err.to_string(), SpecError::CyclicDependency.to_string());
    }

    #[test]
    fn store_not_found_passes_through() {
        let err = EngineError::from(StoreError::ComponentNotFound(ComponentId::new("c")));
        assert!(err.to_string().contains("'c' not found"));
    }
}
