//! Specification-level error kinds.

use crate::id::StepName;

/// Errors raised while parsing, validating, or materializing a component or
/// flow specification.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The document could not be parsed against the strict schema (unknown
    /// fields included), or a validated field held an unusable value.
    #[error("invalid specification: {0}")]
    InvalidSpecification(String),

    /// A dependency entry names a step that is not a key of `steps`.
    #[error("unknown step '{0}' in dependencies")]
    UnknownStep(StepName),

    /// A mount binding carried an unrecognized method or an empty path.
    #[error("invalid mount: {0}")]
    InvalidMount(String),

    /// A `user:` substitution could not be resolved against the host user
    /// database.
    #[error("invalid user: {0}")]
    InvalidUser(String),

    /// The dependency graph contains a directed cycle; no stage assignment
    /// exists.
    #[error("cyclic dependency among flow steps")]
    CyclicDependency,

    /// A required identifier was the empty string.
    #[error("{0} must be a non-empty string")]
    EmptyId(&'static str),
}
