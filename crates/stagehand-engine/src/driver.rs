//! Container engine driver interface.
//!
//! The container engine is an external collaborator: the core only ever
//! talks to it through [`ContainerDriver`], and tests inject fakes. The
//! method set is the small slice of an engine API the orchestrator needs:
//! build an image, create/start/inspect/wait/remove a container.
//!
//! Driver failures are opaque `anyhow` errors; the engine wraps them into
//! the typed [`EngineError`](crate::EngineError) variants with the failing
//! build or execution attached.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stagehand_types::spec::MountMethod;

/// Result alias for driver calls.
pub type DriverResult<T> = anyhow::Result<T>;

/// Options for an image build request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBuildOptions {
    /// Tags applied to the produced image.
    pub tags: Vec<String>,
    /// Dockerfile path relative to the archive root.
    pub dockerfile: String,
    /// Remove intermediate containers on a successful build.
    pub remove_intermediate: bool,
}

/// Configuration of a container to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Image tag to instantiate.
    pub image: String,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// `"<uid>:<gid>"`, a plain uid, or empty for the image default.
    pub user: String,
}

/// A single host-to-container mount on a created container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerMount {
    pub method: MountMethod,
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// Observed state of a container.
///
/// A container is terminal once `running` is false; `exit_code` is only
/// meaningful then. Lifecycle from the engine's viewpoint:
/// created → running → exited(code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerState {
    pub running: bool,
    pub exit_code: i64,
}

/// Capability interface over a container engine.
///
/// Implementations must be shareable (`Send + Sync`): one driver serves
/// every concurrent step of a flow. Every call accepts a cancellation
/// token; a cancelled call returns promptly with an error and leaves any
/// already-started container running.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Agree on an API version with the engine before first use.
    async fn negotiate_api_version(&self, cancel: &CancellationToken) -> DriverResult<()>;

    /// Build an image from a tar archive of the build context. Returns the
    /// engine's response body verbatim, an opaque byte stream the caller
    /// forwards to its output sink.
    async fn build_image(
        &self,
        cancel: &CancellationToken,
        archive: Vec<u8>,
        options: &ImageBuildOptions,
    ) -> DriverResult<Vec<u8>>;

    /// Create a container named `name`, returning the engine's container id.
    async fn create_container(
        &self,
        cancel: &CancellationToken,
        config: &ContainerConfig,
        mounts: &[ContainerMount],
        name: &str,
    ) -> DriverResult<String>;

    /// Start a created container.
    async fn start_container(&self, cancel: &CancellationToken, id: &str) -> DriverResult<()>;

    /// Observe a container's current state.
    async fn inspect_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> DriverResult<ContainerState>;

    /// Block until the container is no longer running; returns its exit
    /// code.
    async fn wait_container(&self, cancel: &CancellationToken, id: &str) -> DriverResult<i64>;

    /// Remove a container. The orchestration core never calls this on its
    /// own; it exists for callers cleaning up after a failed stage.
    async fn remove_container(&self, cancel: &CancellationToken, id: &str) -> DriverResult<()>;
}
