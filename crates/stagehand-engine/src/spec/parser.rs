//! Strict JSON parsing of component and flow specification files.

use std::path::Path;

use stagehand_types::spec::{ComponentSpec, FlowSpec};
use stagehand_types::SpecError;

fn read_spec_file(path: &Path) -> Result<String, SpecError> {
    std::fs::read_to_string(path).map_err(|e| {
        SpecError::InvalidSpecification(format!(
            "could not read specification file '{}': {e}",
            path.display()
        ))
    })
}

/// Parse a component specification document.
///
/// The schema is strict: unknown fields at any level reject the document.
///
/// # Errors
///
/// Returns [`SpecError::InvalidSpecification`] on malformed JSON or unknown
/// fields.
pub fn parse_component_spec_str(doc: &str) -> Result<ComponentSpec, SpecError> {
    serde_json::from_str(doc)
        .map_err(|e| SpecError::InvalidSpecification(format!("component specification: {e}")))
}

/// Parse a component specification file.
///
/// # Errors
///
/// Returns [`SpecError::InvalidSpecification`] when the file cannot be read
/// or does not parse against the strict schema.
pub fn parse_component_spec(path: &Path) -> Result<ComponentSpec, SpecError> {
    parse_component_spec_str(&read_spec_file(path)?)
}

/// Parse a flow specification document.
///
/// Any `stages` present on input are parsed but never trusted; flow
/// materialization recomputes them.
///
/// # Errors
///
/// Returns [`SpecError::InvalidSpecification`] on malformed JSON or unknown
/// fields.
pub fn parse_flow_spec_str(doc: &str) -> Result<FlowSpec, SpecError> {
    serde_json::from_str(doc)
        .map_err(|e| SpecError::InvalidSpecification(format!("flow specification: {e}")))
}

/// Parse a flow specification file.
///
/// # Errors
///
/// Returns [`SpecError::InvalidSpecification`] when the file cannot be read
/// or does not parse against the strict schema.
pub fn parse_flow_spec(path: &Path) -> Result<FlowSpec, SpecError> {
    parse_flow_spec_str(&read_spec_file(path)?)
}
