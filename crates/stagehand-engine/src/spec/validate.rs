//! Referential and value validation of parsed specifications.

use stagehand_types::spec::{ComponentSpec, FlowSpec};
use stagehand_types::SpecError;

/// Validate a parsed component specification.
///
/// Build paths are deliberately not resolved against the filesystem here;
/// that happens at build time.
///
/// # Errors
///
/// Returns [`SpecError::InvalidMount`] when a mountpoint declares an empty
/// container path.
pub fn validate_component_spec(spec: &ComponentSpec) -> Result<(), SpecError> {
    for mountpoint in &spec.run.mountpoints {
        if mountpoint.container_path.is_empty() {
            return Err(SpecError::InvalidMount(
                "mountpoint declares an empty container path".to_string(),
            ));
        }
    }
    Ok(())
}

/// Validate a parsed flow specification.
///
/// Every step must map to a non-empty component id, and every dependency
/// key and element must name a known step.
///
/// # Errors
///
/// Returns [`SpecError::InvalidSpecification`] for an empty component id
/// and [`SpecError::UnknownStep`] for a dependency on an unknown step.
pub fn validate_flow_spec(spec: &FlowSpec) -> Result<(), SpecError> {
    for (step, component) in &spec.steps {
        if component.is_empty() {
            return Err(SpecError::InvalidSpecification(format!(
                "step '{step}' maps to an empty component id"
            )));
        }
    }

    for (step, deps) in &spec.dependencies {
        if !spec.steps.contains_key(step) {
            return Err(SpecError::UnknownStep(step.clone()));
        }
        for dep in deps {
            if !spec.steps.contains_key(dep) {
                return Err(SpecError::UnknownStep(dep.clone()));
            }
        }
    }

    Ok(())
}
