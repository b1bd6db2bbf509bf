//! Materialization: the pass that turns a validated raw specification into
//! its ready-to-execute form by applying substitutions, canonicalizing
//! mount sources, and computing stages.

use std::collections::BTreeMap;

use stagehand_types::id::StepName;
use stagehand_types::spec::{ComponentSpec, FlowSpec, MountBinding, MountMethod};
use stagehand_types::SpecError;

use crate::host::{HostEnv, HostUsers};
use crate::spec::validate::{validate_component_spec, validate_flow_spec};
use crate::stages::compute_stages;
use crate::subst::{materialize_user, materialize_value};

/// Materialize a component specification: validate, then apply `env:`
/// substitution over `run.env` values and the full substitution language
/// over `run.user`.
///
/// # Errors
///
/// Returns [`SpecError::InvalidMount`] from validation or
/// [`SpecError::InvalidUser`] when the user cannot be resolved.
pub fn materialize_component_spec(
    raw: &ComponentSpec,
    env: &dyn HostEnv,
    users: &dyn HostUsers,
) -> Result<ComponentSpec, SpecError> {
    validate_component_spec(raw)?;

    let mut spec = raw.clone();
    spec.run.env = raw
        .run
        .env
        .iter()
        .map(|(name, value)| (name.clone(), materialize_value(value, env)))
        .collect();
    spec.run.user = materialize_user(&raw.run.user, env, users)?;
    Ok(spec)
}

/// Materialize mount bindings: validate each method, substitute the source,
/// and canonicalize it to an absolute path.
///
/// # Errors
///
/// Returns [`SpecError::InvalidMount`] for an unrecognized method, an empty
/// target, or a source that cannot be made absolute.
pub fn materialize_mount_bindings(
    raw: &[MountBinding],
    env: &dyn HostEnv,
) -> Result<Vec<MountBinding>, SpecError> {
    raw.iter()
        .map(|binding| {
            MountMethod::parse(&binding.method)?;
            if binding.target.is_empty() {
                return Err(SpecError::InvalidMount(
                    "mount binding declares an empty target".to_string(),
                ));
            }

            let source = materialize_value(&binding.source, env);
            let source = std::path::absolute(&source)
                .map_err(|e| {
                    SpecError::InvalidMount(format!(
                        "cannot resolve mount source '{source}': {e}"
                    ))
                })?
                .to_string_lossy()
                .into_owned();

            Ok(MountBinding {
                source,
                target: binding.target.clone(),
                method: binding.method.clone(),
            })
        })
        .collect()
}

/// Materialize a flow specification: validate, compute `stages`, and
/// materialize every mount binding and per-step environment mapping.
///
/// # Errors
///
/// Returns the first [`SpecError`] encountered by validation, the stage
/// scheduler, or binding materialization.
pub fn materialize_flow_spec(raw: &FlowSpec, env: &dyn HostEnv) -> Result<FlowSpec, SpecError> {
    validate_flow_spec(raw)?;

    let mut spec = raw.clone();
    spec.stages = compute_stages(raw)?;

    spec.mounts = raw
        .mounts
        .iter()
        .map(|(step, bindings)| {
            Ok((step.clone(), materialize_mount_bindings(bindings, env)?))
        })
        .collect::<Result<BTreeMap<StepName, Vec<MountBinding>>, SpecError>>()?;

    spec.env = raw
        .env
        .iter()
        .map(|(step, vars)| {
            let vars = vars
                .iter()
                .map(|(name, value)| (name.clone(), materialize_value(value, env)))
                .collect();
            (step.clone(), vars)
        })
        .collect();

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use stagehand_types::id::ComponentId;
    use stagehand_types::spec::RunSpec;

    use super::*;
    use crate::testutil::{MapEnv, MapUsers};

    #[test]
    fn component_env_and_user_are_substituted() {
        let raw = ComponentSpec {
            run: RunSpec {
                env: [
                    ("MODE".to_string(), "batch".to_string()),
                    ("TOKEN".to_string(), "env:API_TOKEN".to_string()),
                ]
                .into(),
                user: "user:svc".to_string(),
                ..RunSpec::default()
            },
            ..ComponentSpec::default()
        };
        let env = MapEnv::with([("API_TOKEN", "s3cret")]);
        let users = MapUsers::with([("svc", (1001, 1002))]);

        let spec = materialize_component_spec(&raw, &env, &users).unwrap();
        assert_eq!(spec.run.env["MODE"], "batch");
        assert_eq!(spec.run.env["TOKEN"], "s3cret");
        assert_eq!(spec.run.user, "1001:1002");
    }

    #[test]
    fn component_materialization_fails_on_unknown_user() {
        let raw = ComponentSpec {
            run: RunSpec {
                user: "user:ghost".to_string(),
                ..RunSpec::default()
            },
            ..ComponentSpec::default()
        };
        let result =
            materialize_component_spec(&raw, &MapEnv::default(), &MapUsers::default());
        assert!(matches!(result, Err(SpecError::InvalidUser(_))));
    }

    #[test]
    fn bindings_substitute_and_absolutize_sources() {
        let raw = vec![MountBinding {
            source: "env:DATA_FILE".to_string(),
            target: "/inputs.txt".to_string(),
            method: "bind".to_string(),
        }];
        let env = MapEnv::with([("DATA_FILE", "/srv/data/input.txt")]);

        let bindings = materialize_mount_bindings(&raw, &env).unwrap();
        assert_eq!(bindings[0].source, "/srv/data/input.txt");
        assert_eq!(bindings[0].target, "/inputs.txt");
    }

    #[test]
    fn relative_binding_sources_become_absolute() {
        let raw = vec![MountBinding {
            source: "data/input.txt".to_string(),
            target: "/inputs.txt".to_string(),
            method: "bind".to_string(),
        }];
        let bindings = materialize_mount_bindings(&raw, &MapEnv::default()).unwrap();
        let source = std::path::Path::new(&bindings[0].source);
        assert!(source.is_absolute());
        assert!(bindings[0].source.ends_with("data/input.txt"));
    }

    #[test]
    fn unrecognized_binding_method_is_invalid_mount() {
        let raw = vec![MountBinding {
            source: "/tmp/x".to_string(),
            target: "/in".to_string(),
            method: "overlay".to_string(),
        }];
        assert!(matches!(
            materialize_mount_bindings(&raw, &MapEnv::default()).unwrap_err(),
            SpecError::InvalidMount(_)
        ));
    }

    #[test]
    fn flow_materialization_computes_stages_and_env() {
        let raw = FlowSpec {
            steps: [
                (StepName::new("a"), ComponentId::new("component-a")),
                (StepName::new("b"), ComponentId::new("component-b")),
            ]
            .into(),
            dependencies: [(StepName::new("b"), vec![StepName::new("a")])].into(),
            mounts: [(
                StepName::new("a"),
                vec![MountBinding {
                    source: "/tmp/temp.txt".to_string(),
                    target: "/input.txt".to_string(),
                    method: "bind".to_string(),
                }],
            )]
            .into(),
            env: [(
                StepName::new("a"),
                [("GREETING".to_string(), "env:GREETING".to_string())].into(),
            )]
            .into(),
            stages: Vec::new(),
        };
        let env = MapEnv::with([("GREETING", "hello")]);

        let spec = materialize_flow_spec(&raw, &env).unwrap();
        assert_eq!(
            spec.stages,
            vec![vec![StepName::new("a")], vec![StepName::new("b")]]
        );
        assert_eq!(spec.mounts[&StepName::new("a")][0].source, "/tmp/temp.txt");
        assert_eq!(spec.env[&StepName::new("a")]["GREETING"], "hello");
    }

    #[test]
    fn input_stages_are_discarded_and_recomputed() {
        let raw = FlowSpec {
            steps: [
                (StepName::new("a"), ComponentId::new("component-a")),
                (StepName::new("b"), ComponentId::new("component-b")),
            ]
            .into(),
            dependencies: [(StepName::new("b"), vec![StepName::new("a")])].into(),
            // Lying input: claims b runs first.
            stages: vec![vec![StepName::new("b")], vec![StepName::new("a")]],
            ..FlowSpec::default()
        };
        let spec = materialize_flow_spec(&raw, &MapEnv::default()).unwrap();
        assert_eq!(
            spec.stages,
            vec![vec![StepName::new("a")], vec![StepName::new("b")]]
        );
    }

    #[test]
    fn cyclic_flow_fails_materialization() {
        let raw = FlowSpec {
            steps: [
                (StepName::new("a"), ComponentId::new("ca")),
                (StepName::new("b"), ComponentId::new("cb")),
            ]
            .into(),
            dependencies: [
                (StepName::new("a"), vec![StepName::new("b")]),
                (StepName::new("b"), vec![StepName::new("a")]),
            ]
            .into(),
            ..FlowSpec::default()
        };
        assert!(matches!(
            materialize_flow_spec(&raw, &MapEnv::default()).unwrap_err(),
            SpecError::CyclicDependency
        ));
    }
}
