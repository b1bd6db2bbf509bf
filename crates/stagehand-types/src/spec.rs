//! Component and flow specification value objects.
//!
//! These are parsed from user-authored JSON documents. Schemas are strict:
//! unknown fields anywhere in the document reject the specification. The
//! parsed forms are *raw*; validation and substitution happen in the
//! engine's materialization pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::id::{ComponentId, StepName};

/// How a component of a stagehand flow is built and executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    #[serde(default)]
    pub build: BuildSpec,
    #[serde(default)]
    pub run: RunSpec,
}

/// How a component's image is built. Paths are relative to the component's
/// context directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
    /// Build context directory.
    #[serde(default)]
    pub context: String,
    /// Dockerfile path, relative to the build context.
    #[serde(default)]
    pub dockerfile: String,
}

/// How a component's container is run.
///
/// `env` values and `user` accept the `env:NAME` substitution form; `user`
/// additionally accepts `user:NAME`, replaced with `"<uid>:<gid>"` from the
/// host user database. An empty `user` means the container's default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSpec {
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub entrypoint: Vec<String>,
    #[serde(default)]
    pub cmd: Vec<String>,
    #[serde(default)]
    pub mountpoints: Vec<MountPoint>,
    #[serde(default)]
    pub user: String,
}

/// A path inside the component's container that accepts data at runtime.
///
/// Declared by the component; which host path (if any) lands there is the
/// flow's or caller's choice, expressed as a [`MountBinding`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountPoint {
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub required: bool,
}

/// A host-to-container path connection chosen at execution time.
///
/// `source` accepts the `env:NAME` substitution form and is canonicalized to
/// an absolute path during materialization. `method` is kept raw here and
/// checked against [`MountMethod`] when the binding is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountBinding {
    pub source: String,
    pub target: String,
    pub method: String,
}

/// Recognized mount methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountMethod {
    Bind,
    Volume,
    Tmpfs,
}

impl MountMethod {
    /// Wire-format string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bind => "bind",
            Self::Volume => "volume",
            Self::Tmpfs => "tmpfs",
        }
    }

    /// Parse a raw binding method.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidMount`] for anything other than `bind`,
    /// `volume`, or `tmpfs`.
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        match raw {
            "bind" => Ok(Self::Bind),
            "volume" => Ok(Self::Volume),
            "tmpfs" => Ok(Self::Tmpfs),
            other => Err(SpecError::InvalidMount(format!(
                "unrecognized mount method '{other}', expected one of bind, volume, tmpfs"
            ))),
        }
    }
}

impl std::fmt::Display for MountMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entire flow: a DAG of steps, each bound to a component.
///
/// `stages` is computed output: accepted on input for symmetry but always
/// discarded and recomputed during materialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowSpec {
    /// Step name to component id.
    pub steps: BTreeMap<StepName, ComponentId>,
    /// Step name to the steps it depends on.
    #[serde(default)]
    pub dependencies: BTreeMap<StepName, Vec<StepName>>,
    /// Step name to the mount bindings applied to its container.
    #[serde(default)]
    pub mounts: BTreeMap<StepName, Vec<MountBinding>>,
    /// Step name to extra environment for its container. Merged over the
    /// component's own `run.env`, with these values winning.
    #[serde(default)]
    pub env: BTreeMap<StepName, BTreeMap<String, String>>,
    /// Parallel-safe execution levels, in dependency order.
    #[serde(default)]
    pub stages: Vec<Vec<StepName>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_method_parse() {
        assert_eq!(MountMethod::parse("bind").unwrap(), MountMethod::Bind);
        assert_eq!(MountMethod::parse("volume").unwrap(), MountMethod::Volume);
        assert_eq!(MountMethod::parse("tmpfs").unwrap(), MountMethod::Tmpfs);
        assert!(matches!(
            MountMethod::parse("overlay"),
            Err(SpecError::InvalidMount(_))
        ));
    }

    #[test]
    fn component_spec_rejects_unknown_fields() {
        let doc = r#"{"build": {"context": "."}, "run": {}, "extra": 1}"#;
        assert!(serde_json::from_str::<ComponentSpec>(doc).is_err());
    }

    #[test]
    fn component_spec_rejects_nested_unknown_fields() {
        let doc = r#"{"run": {"cmd": ["true"], "shell": "/bin/sh"}}"#;
        assert!(serde_json::from_str::<ComponentSpec>(doc).is_err());
    }

    #[test]
    fn component_spec_defaults_are_empty() {
        let spec: ComponentSpec = serde_json::from_str("{}").unwrap();
        assert!(spec.run.env.is_empty());
        assert!(spec.run.cmd.is_empty());
        assert!(spec.run.user.is_empty());
        assert!(spec.build.context.is_empty());
    }

    #[test]
    fn flow_spec_parses_minimal_document() {
        let doc = r#"{"steps": {"a": "component-a"}}"#;
        let spec: FlowSpec = serde_json::from_str(doc).unwrap();
        assert_eq!(spec.steps.len(), 1);
        assert!(spec.dependencies.is_empty());
        assert!(spec.stages.is_empty());
    }

    #[test]
    fn flow_spec_rejects_unknown_fields() {
        let doc = r#"{"steps": {"a": "component-a"}, "retries": 3}"#;
        assert!(serde_json::from_str::<FlowSpec>(doc).is_err());
    }

    #[test]
    fn mount_binding_rejects_unknown_fields() {
        let doc = r#"{"source": "/tmp/x", "target": "/in", "method": "bind", "mode": "ro"}"#;
        assert!(serde_json::from_str::<MountBinding>(doc).is_err());
    }
}
