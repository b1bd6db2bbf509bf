//! Orchestrator facade: the user-facing verbs.
//!
//! Composes the metadata store, the container driver, and the host
//! capabilities for registration, building, and execution. Construction
//! wires everything once; no global mutable state exists anywhere in the
//! core.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use stagehand_store::{MetadataStore, SqliteMetadataStore};
use stagehand_types::id::{BuildId, ComponentId, FlowId, StepName};
use stagehand_types::record::{
    BuildRecord, ComponentKind, ComponentRecord, ExecutionRecord, FlowRecord,
};
use stagehand_types::spec::MountBinding;

use crate::driver::ContainerDriver;
use crate::errors::EngineError;
use crate::host::Host;
use crate::run_blocking;
use crate::spec::{
    materialize_mount_bindings, parse_component_spec, parse_flow_spec, validate_component_spec,
    validate_flow_spec,
};
use crate::subst::materialize_value;
use crate::{build, execute};

/// The orchestration core, fully wired.
pub struct Orchestrator {
    store: Arc<dyn MetadataStore>,
    driver: Arc<dyn ContainerDriver>,
    host: Host,
}

impl Orchestrator {
    /// Compose an orchestrator from explicit collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn MetadataStore>,
        driver: Arc<dyn ContainerDriver>,
        host: Host,
    ) -> Self {
        Self {
            store,
            driver,
            host,
        }
    }

    /// Open the metadata store of an initialized state directory and wire
    /// the real host capabilities around the given driver.
    ///
    /// # Errors
    ///
    /// Fails when the state directory holds no store.
    pub fn open(state_dir: &Path, driver: Arc<dyn ContainerDriver>) -> Result<Self, EngineError> {
        let store = SqliteMetadataStore::open(state_dir)?;
        Ok(Self::new(Arc::new(store), driver, Host::system()))
    }

    /// The metadata store, for read-only listings.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Agree on an API version with the container engine. Call once before
    /// the first build or execution verb.
    ///
    /// # Errors
    ///
    /// Surfaces the driver's failure as [`EngineError::Internal`].
    pub async fn negotiate_api_version(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.driver
            .negotiate_api_version(cancel)
            .await
            .map_err(EngineError::Internal)
    }

    /// Register a component: validate its specification file, then persist
    /// the record. The context path is made absolute; the specification
    /// path defaults to `component.json` inside it.
    ///
    /// # Errors
    ///
    /// `EmptyId`, `InvalidSpecification`, `InvalidMount`, or a store
    /// persistence failure (including a duplicate id).
    pub async fn register_component(
        &self,
        id: ComponentId,
        kind: ComponentKind,
        context_path: PathBuf,
        spec_path: Option<PathBuf>,
    ) -> Result<ComponentRecord, EngineError> {
        let store = self.store.clone();
        let created_at = self.host.clock.now_unix();
        run_blocking(move || {
            let context_path = absolute_path(context_path)?;
            let spec_path = spec_path.map(absolute_path).transpose()?;
            let record = ComponentRecord::new(id, kind, context_path, spec_path, created_at)?;

            let spec = parse_component_spec(&record.spec_path)?;
            validate_component_spec(&spec)?;

            store.insert_component(&record)?;
            tracing::info!(component = %record.id, "Component registered");
            Ok(record)
        })
        .await
    }

    /// Remove a component. Builds and executions that reference it are
    /// left in place.
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` or a store failure.
    pub async fn remove_component(&self, id: ComponentId) -> Result<(), EngineError> {
        let store = self.store.clone();
        run_blocking(move || {
            store.delete_component(&id)?;
            tracing::info!(component = %id, "Component removed");
            Ok(())
        })
        .await
    }

    /// Register a flow: validate its specification file, then persist the
    /// record with the absolute specification path.
    ///
    /// # Errors
    ///
    /// `EmptyId`, `InvalidSpecification`, `UnknownStep`, or a store
    /// persistence failure (including a duplicate id).
    pub async fn register_flow(
        &self,
        id: FlowId,
        spec_path: PathBuf,
    ) -> Result<FlowRecord, EngineError> {
        let store = self.store.clone();
        let created_at = self.host.clock.now_unix();
        run_blocking(move || {
            let spec_path = absolute_path(spec_path)?;
            let record = FlowRecord::new(id, spec_path, created_at)?;

            let spec = parse_flow_spec(&record.spec_path)?;
            validate_flow_spec(&spec)?;

            store.insert_flow(&record)?;
            tracing::info!(flow = %record.id, "Flow registered");
            Ok(record)
        })
        .await
    }

    /// Build a fresh image for one component, forwarding the engine's
    /// build output to `sink`.
    ///
    /// # Errors
    ///
    /// See [`EngineError`]; driver errors carry the attempted build id.
    pub async fn build_component(
        &self,
        id: ComponentId,
        sink: &mut (dyn Write + Send),
        cancel: &CancellationToken,
    ) -> Result<BuildRecord, EngineError> {
        build::build_component(
            self.store.clone(),
            self.driver.clone(),
            self.host.clock.clone(),
            id,
            sink,
            cancel,
        )
        .await
    }

    /// Build every distinct component of a flow, one image each.
    ///
    /// # Errors
    ///
    /// See [`EngineError`].
    pub async fn build_flow(
        &self,
        id: FlowId,
        sink: &mut (dyn Write + Send),
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<ComponentId, BuildRecord>, EngineError> {
        build::build_flow(
            self.store.clone(),
            self.driver.clone(),
            self.host.clock.clone(),
            id,
            sink,
            cancel,
        )
        .await
    }

    /// Run a standalone container for a build. The caller-supplied mounts
    /// and environment go through the same materialization as a flow's
    /// (`env:` substitution, mount-source canonicalization).
    ///
    /// # Errors
    ///
    /// See [`EngineError`].
    pub async fn execute_build(
        &self,
        build_id: BuildId,
        mounts: Vec<MountBinding>,
        env: BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionRecord, EngineError> {
        let mounts = materialize_mount_bindings(&mounts, self.host.env.as_ref())?;
        let env = env
            .into_iter()
            .map(|(name, value)| {
                let value = materialize_value(&value, self.host.env.as_ref());
                (name, value)
            })
            .collect();
        execute::execute_build(
            self.store.clone(),
            self.driver.clone(),
            self.host.clone(),
            build_id,
            None,
            mounts,
            env,
            cancel,
        )
        .await
    }

    /// Execute a flow: materialize, schedule, and run its stages.
    ///
    /// # Errors
    ///
    /// See [`EngineError`]; a failing stage carries every started
    /// execution so callers can inspect the containers.
    pub async fn execute_flow(
        &self,
        id: FlowId,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<StepName, ExecutionRecord>, EngineError> {
        execute::execute_flow(
            self.store.clone(),
            self.driver.clone(),
            self.host.clone(),
            id,
            cancel,
        )
        .await
    }
}

fn absolute_path(path: PathBuf) -> Result<PathBuf, EngineError> {
    std::path::absolute(&path).map_err(|e| {
        EngineError::Internal(anyhow::anyhow!(
            "cannot resolve path '{}': {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use stagehand_store::StoreError;
    use stagehand_types::SpecError;

    use super::*;
    use crate::testutil::{fixed_host, FakeDriver, MapEnv, MapUsers};

    struct Fixture {
        _dir: tempfile::TempDir,
        orchestrator: Orchestrator,
        driver: Arc<FakeDriver>,
    }

    impl Fixture {
        fn new() -> Self {
            let driver = Arc::new(FakeDriver::default());
            let orchestrator = Orchestrator::new(
                Arc::new(stagehand_store::SqliteMetadataStore::in_memory().unwrap()),
                driver.clone(),
                fixed_host(MapEnv::default(), MapUsers::default()),
            );
            Self {
                _dir: tempfile::tempdir().unwrap(),
                orchestrator,
                driver,
            }
        }

        fn write_component(&self, id: &str, spec_doc: &str) -> PathBuf {
            let context = self._dir.path().join(id);
            std::fs::create_dir_all(&context).unwrap();
            std::fs::write(context.join("component.json"), spec_doc).unwrap();
            context
        }
    }

    #[tokio::test]
    async fn register_component_validates_spec_file() {
        let fx = Fixture::new();
        let context = fx.write_component("extract", r#"{"run": {"cmd": ["true"]}}"#);

        let record = fx
            .orchestrator
            .register_component(
                ComponentId::new("extract"),
                ComponentKind::Task,
                context.clone(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(record.spec_path, context.join("component.json"));
        assert!(record.context_path.is_absolute());

        let listed = fx.orchestrator.store().list_components().unwrap();
        assert_eq!(listed, vec![record]);
    }

    #[tokio::test]
    async fn register_component_rejects_bad_spec_document() {
        let fx = Fixture::new();
        let context = fx.write_component("extract", r#"{"run": {}, "unknown_key": true}"#);

        let err = fx
            .orchestrator
            .register_component(
                ComponentId::new("extract"),
                ComponentKind::Task,
                context,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Spec(SpecError::InvalidSpecification(_))
        ));
        assert!(fx.orchestrator.store().list_components().unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_component_rejects_duplicate_id() {
        let fx = Fixture::new();
        let context = fx.write_component("extract", r#"{"run": {"cmd": ["true"]}}"#);

        fx.orchestrator
            .register_component(
                ComponentId::new("extract"),
                ComponentKind::Task,
                context.clone(),
                None,
            )
            .await
            .unwrap();
        let err = fx
            .orchestrator
            .register_component(
                ComponentId::new("extract"),
                ComponentKind::Task,
                context,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Sqlite(_))));
    }

    #[tokio::test]
    async fn register_flow_rejects_unknown_dependency() {
        let fx = Fixture::new();
        let path = fx._dir.path().join("flow.json");
        std::fs::write(
            &path,
            r#"{"steps": {"a": "ca"}, "dependencies": {"a": ["ghost"]}}"#,
        )
        .unwrap();

        let err = fx
            .orchestrator
            .register_flow(FlowId::new("nightly"), path)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Spec(SpecError::UnknownStep(_))));
    }

    #[tokio::test]
    async fn standalone_execution_materializes_caller_inputs() {
        let fx = Fixture::new();
        let context = fx.write_component(
            "extract",
            r#"{"run": {"cmd": ["true"], "env": {},
                "mountpoints": [{"container_path": "/in", "required": true}]}}"#,
        );
        fx.orchestrator
            .register_component(
                ComponentId::new("extract"),
                ComponentKind::Task,
                context,
                None,
            )
            .await
            .unwrap();
        let build = fx
            .orchestrator
            .build_component(
                ComponentId::new("extract"),
                &mut Vec::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let execution = fx
            .orchestrator
            .execute_build(
                build.id,
                vec![MountBinding {
                    source: "/tmp/in.txt".to_string(),
                    target: "/in".to_string(),
                    method: "bind".to_string(),
                }],
                BTreeMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(execution.flow_id, None);
        let container = fx.driver.container(execution.id.as_str()).unwrap();
        assert_eq!(container.mounts[0].source, "/tmp/in.txt");
    }

    #[tokio::test]
    async fn remove_component_missing_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .orchestrator
            .remove_component(ComponentId::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Store(StoreError::ComponentNotFound(_))
        ));
    }
}
