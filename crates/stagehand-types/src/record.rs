//! Persisted metadata records.
//!
//! These are the rows the metadata store durably keeps for components,
//! flows, builds, and executions. All timestamps are whole seconds since
//! the Unix epoch; the store never keeps sub-second precision.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::id::{BuildId, ComponentId, ExecutionId, FlowId};

/// File name looked for inside a component's context directory when no
/// explicit specification path is given at registration.
pub const DEFAULT_SPEC_FILE: &str = "component.json";

/// Image-name prefix attached to every build tag.
pub const IMAGE_PREFIX: &str = "stagehand";

/// Kind of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// A long-running process that must be available while a flow runs.
    Service,
    /// A process run to completion as one step of a flow.
    Task,
}

impl ComponentKind {
    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Task => "task",
        }
    }

    /// Parse the wire-format string.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidSpecification`] for unrecognized values.
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        match raw {
            "service" => Ok(Self::Service),
            "task" => Ok(Self::Task),
            other => Err(SpecError::InvalidSpecification(format!(
                "unrecognized component kind '{other}', expected 'service' or 'task'"
            ))),
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata row for a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: ComponentId,
    pub kind: ComponentKind,
    /// Absolute path of the directory holding the component implementation.
    pub context_path: PathBuf,
    /// Absolute path of the component specification file.
    pub spec_path: PathBuf,
    pub created_at: i64,
}

impl ComponentRecord {
    /// Build a component record from registration inputs, applying the
    /// default specification path (`<context_path>/component.json`) when
    /// none is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::EmptyId`] when `id` or `context_path` is empty.
    pub fn new(
        id: ComponentId,
        kind: ComponentKind,
        context_path: PathBuf,
        spec_path: Option<PathBuf>,
        created_at: i64,
    ) -> Result<Self, SpecError> {
        if id.is_empty() {
            return Err(SpecError::EmptyId("component id"));
        }
        if context_path.as_os_str().is_empty() {
            return Err(SpecError::EmptyId("component context path"));
        }
        let spec_path = spec_path.unwrap_or_else(|| context_path.join(DEFAULT_SPEC_FILE));
        Ok(Self {
            id,
            kind,
            context_path,
            spec_path,
            created_at,
        })
    }
}

/// Metadata row for a registered flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub id: FlowId,
    /// Absolute path of the flow specification file.
    pub spec_path: PathBuf,
    pub created_at: i64,
}

impl FlowRecord {
    /// Build a flow record from registration inputs.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::EmptyId`] when `id` or `spec_path` is empty.
    pub fn new(id: FlowId, spec_path: PathBuf, created_at: i64) -> Result<Self, SpecError> {
        if id.is_empty() {
            return Err(SpecError::EmptyId("flow id"));
        }
        if spec_path.as_os_str().is_empty() {
            return Err(SpecError::EmptyId("flow specification path"));
        }
        Ok(Self {
            id,
            spec_path,
            created_at,
        })
    }
}

/// Metadata row for one image build of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Doubles as the primary image tag: `stagehand/<component_id>:<secs>`.
    pub id: BuildId,
    pub component_id: ComponentId,
    pub created_at: i64,
}

impl BuildRecord {
    /// Derive a fresh (as yet unbuilt) build record for a component.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::EmptyId`] when `component_id` is empty.
    pub fn new(component_id: ComponentId, created_at: i64) -> Result<Self, SpecError> {
        if component_id.is_empty() {
            return Err(SpecError::EmptyId("component id"));
        }
        let id = BuildId::new(format!("{IMAGE_PREFIX}/{component_id}:{created_at}"));
        Ok(Self {
            id,
            component_id,
            created_at,
        })
    }

    /// The `:latest` alias for this build's image: everything after the
    /// final `:` in the build id replaced with `latest`.
    #[must_use]
    pub fn latest_alias(&self) -> String {
        match self.id.as_str().rsplit_once(':') {
            Some((image, _)) => format!("{image}:latest"),
            None => format!("{}:latest", self.id),
        }
    }
}

/// Metadata row for one container instantiation of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Random identifier; also the name given to the container.
    pub id: ExecutionId,
    pub build_id: BuildId,
    pub component_id: ComponentId,
    pub created_at: i64,
    /// Set when the execution ran as a step of a flow; `None` for
    /// standalone executions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<FlowId>,
}

impl ExecutionRecord {
    /// Build an execution record for a potential run of `build`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::EmptyId`] when the build carries an empty build
    /// or component id.
    pub fn new(
        id: ExecutionId,
        build: &BuildRecord,
        flow_id: Option<FlowId>,
        created_at: i64,
    ) -> Result<Self, SpecError> {
        if build.id.is_empty() {
            return Err(SpecError::EmptyId("build id"));
        }
        if build.component_id.is_empty() {
            return Err(SpecError::EmptyId("component id"));
        }
        Ok(Self {
            id,
            build_id: build.id.clone(),
            component_id: build.component_id.clone(),
            created_at,
            flow_id,
        })
    }
}

/// Join absolute-or-relative specification input paths against a base.
#[must_use]
pub fn resolve_path(base: &Path, relative: &str) -> PathBuf {
    let rel = Path::new(relative);
    if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        base.join(rel)
    }
}
