//! Execution engine: single-build container runs and staged flow runs.
//!
//! The one ordering rule that matters for crash safety: an execution
//! record is persisted *after* the container is created but *before* it is
//! started, so no crash can leave a running container the store knows
//! nothing about.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use stagehand_store::{MetadataStore, StoreError};
use stagehand_types::id::{BuildId, FlowId, StepName};
use stagehand_types::record::ExecutionRecord;
use stagehand_types::spec::{MountBinding, MountMethod};

use crate::driver::{ContainerConfig, ContainerDriver, ContainerMount};
use crate::errors::{EngineError, StepFailure};
use crate::host::Host;
use crate::run_blocking;
use crate::spec::{materialize_component_spec, materialize_flow_spec, parse_component_spec,
    parse_flow_spec};

/// Run one container for a build.
///
/// `mounts` and `env_overrides` must already be materialized (flow
/// materialization or the facade does this); values here are literal.
/// Returns the persisted execution record; the container is left to run.
///
/// # Errors
///
/// `BuildNotFound`, `ComponentNotFound`, `InvalidSpecification`,
/// `RequiredMountMissing`, `ContainerCreateFailed`, `ContainerStartFailed`,
/// or a store persistence failure.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn execute_build(
    store: Arc<dyn MetadataStore>,
    driver: Arc<dyn ContainerDriver>,
    host: Host,
    build_id: BuildId,
    flow_id: Option<FlowId>,
    mounts: Vec<MountBinding>,
    env_overrides: BTreeMap<String, String>,
    cancel: &CancellationToken,
) -> Result<ExecutionRecord, EngineError> {
    let (build, spec) = {
        let store = store.clone();
        run_blocking(move || {
            let build = store.select_build(&build_id)?;
            let component = store.select_component(&build.component_id)?;
            let spec = parse_component_spec(&component.spec_path)?;
            Ok((build, spec))
        })
        .await?
    };
    let run = materialize_component_spec(&spec, host.env.as_ref(), host.users.as_ref())?.run;

    // One source per container path: the last binding for a target wins.
    let by_target: BTreeMap<&str, &MountBinding> =
        mounts.iter().map(|m| (m.target.as_str(), m)).collect();

    let mut container_mounts = Vec::new();
    for mountpoint in &run.mountpoints {
        match by_target.get(mountpoint.container_path.as_str()) {
            Some(binding) => container_mounts.push(ContainerMount {
                method: MountMethod::parse(&binding.method)?,
                source: binding.source.clone(),
                target: mountpoint.container_path.clone(),
                read_only: mountpoint.read_only,
            }),
            None if mountpoint.required => {
                return Err(EngineError::RequiredMountMissing(
                    mountpoint.container_path.clone(),
                ));
            }
            None => {}
        }
    }

    // Merged environment; caller-supplied values win.
    let mut env = run.env;
    env.extend(env_overrides);

    let execution = ExecutionRecord::new(host.ids.next(), &build, flow_id, host.clock.now_unix())?;
    let config = ContainerConfig {
        image: build.id.to_string(),
        cmd: run.cmd,
        entrypoint: run.entrypoint,
        env,
        user: run.user,
    };

    tracing::debug!(execution = %execution.id, image = %config.image, "Creating container");
    let container_id = driver
        .create_container(cancel, &config, &container_mounts, execution.id.as_str())
        .await
        .map_err(|source| EngineError::ContainerCreateFailed {
            execution_id: execution.id.clone(),
            source,
        })?;

    // Persist before start: the store must know about every container that
    // might be running.
    {
        let store = store.clone();
        let record = execution.clone();
        run_blocking(move || store.insert_execution(&record).map_err(EngineError::from)).await?;
    }

    driver
        .start_container(cancel, &container_id)
        .await
        .map_err(|source| EngineError::ContainerStartFailed {
            execution_id: execution.id.clone(),
            source,
        })?;

    tracing::info!(execution = %execution.id, build = %execution.build_id, "Container started");
    Ok(execution)
}

/// Execute a flow: materialize its specification, resolve the latest build
/// of every step's component, then run the stages in order with the steps
/// of each stage fanned out concurrently.
///
/// Returns the execution record of every step on success. On a stage
/// failure the composite [`EngineError::StageFailed`] carries every started
/// execution (containers are not removed) alongside the per-step errors.
///
/// # Errors
///
/// `FlowNotFound`, `InvalidSpecification`, `CyclicDependency`,
/// `NoBuildForComponent` (checked before anything starts), or
/// `StageFailed`.
pub(crate) async fn execute_flow(
    store: Arc<dyn MetadataStore>,
    driver: Arc<dyn ContainerDriver>,
    host: Host,
    flow_id: FlowId,
    cancel: &CancellationToken,
) -> Result<BTreeMap<StepName, ExecutionRecord>, EngineError> {
    let spec = {
        let store = store.clone();
        let flow_id = flow_id.clone();
        let env = host.env.clone();
        run_blocking(move || {
            let flow = store.select_flow(&flow_id)?;
            let raw = parse_flow_spec(&flow.spec_path)?;
            Ok(materialize_flow_spec(&raw, env.as_ref())?)
        })
        .await?
    };

    // Resolve every step's build up front; a missing build fails the flow
    // before any container starts.
    let builds: BTreeMap<StepName, BuildId> = {
        let store = store.clone();
        let steps = spec.steps.clone();
        run_blocking(move || {
            let mut builds = BTreeMap::new();
            for (step, component) in &steps {
                let build = store.select_latest_build(component).map_err(|e| match e {
                    StoreError::BuildNotFound(_) => {
                        EngineError::NoBuildForComponent(component.clone())
                    }
                    other => EngineError::from(other),
                })?;
                builds.insert(step.clone(), build.id);
            }
            Ok(builds)
        })
        .await?
    };

    let executions: Arc<Mutex<BTreeMap<StepName, ExecutionRecord>>> = Arc::default();

    for (stage_index, stage) in spec.stages.iter().enumerate() {
        tracing::info!(
            flow = %flow_id,
            stage = stage_index,
            steps = stage.len(),
            "Starting stage"
        );

        let mut join_set: JoinSet<(StepName, Result<(), EngineError>)> = JoinSet::new();
        for step in stage {
            let step = step.clone();
            let store = store.clone();
            let driver = driver.clone();
            let host = host.clone();
            let build_id = builds[&step].clone();
            let flow = flow_id.clone();
            let mounts = spec.mounts.get(&step).cloned().unwrap_or_default();
            let env = spec.env.get(&step).cloned().unwrap_or_default();
            let executions = executions.clone();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let result = run_step(
                    store, driver, host, step.clone(), build_id, flow, mounts, env, executions,
                    cancel,
                )
                .await;
                (step, result)
            });
        }

        // Every started step is awaited, even after a failure; otherwise
        // containers leak past the stage barrier.
        let mut failures = Vec::new();
        let mut panicked: Option<EngineError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((step, Err(error))) => {
                    tracing::warn!(step = %step, %error, "Step failed");
                    failures.push(StepFailure {
                        step,
                        error: Box::new(error),
                    });
                }
                Err(join_err) => {
                    if panicked.is_none() {
                        panicked = Some(EngineError::Internal(anyhow::anyhow!(
                            "step task panicked: {join_err}"
                        )));
                    }
                }
            }
        }
        if let Some(err) = panicked {
            return Err(err);
        }
        if !failures.is_empty() {
            failures.sort_by(|a, b| a.step.cmp(&b.step));
            let executions = snapshot(&executions)?;
            return Err(EngineError::StageFailed {
                stage_index,
                failures,
                executions,
            });
        }
    }

    snapshot(&executions)
}

/// Run one step of a stage: start its container, then wait for a terminal
/// state. The execution record lands in the shared map as soon as the
/// container has started, so the flow's caller sees it even if the wait
/// fails.
#[allow(clippy::too_many_arguments)]
async fn run_step(
    store: Arc<dyn MetadataStore>,
    driver: Arc<dyn ContainerDriver>,
    host: Host,
    step: StepName,
    build_id: BuildId,
    flow_id: FlowId,
    mounts: Vec<MountBinding>,
    env: BTreeMap<String, String>,
    executions: Arc<Mutex<BTreeMap<StepName, ExecutionRecord>>>,
    cancel: CancellationToken,
) -> Result<(), EngineError> {
    let execution = execute_build(
        store,
        driver.clone(),
        host,
        build_id,
        Some(flow_id),
        mounts,
        env,
        &cancel,
    )
    .await?;

    {
        let mut map = executions
            .lock()
            .map_err(|_| EngineError::Internal(anyhow::anyhow!("execution map lock poisoned")))?;
        map.insert(step.clone(), execution.clone());
    }

    let code = driver
        .wait_container(&cancel, execution.id.as_str())
        .await
        .map_err(|source| EngineError::ContainerWaitFailed {
            execution_id: execution.id.clone(),
            source,
        })?;
    if code != 0 {
        return Err(EngineError::NonZeroExit { step, code });
    }
    Ok(())
}

fn snapshot(
    executions: &Arc<Mutex<BTreeMap<StepName, ExecutionRecord>>>,
) -> Result<BTreeMap<StepName, ExecutionRecord>, EngineError> {
    executions
        .lock()
        .map(|map| map.clone())
        .map_err(|_| EngineError::Internal(anyhow::anyhow!("execution map lock poisoned")))
}
