//! Specification loading: strict parsing, validation, and materialization.
//!
//! A raw specification becomes ready-to-execute in three passes:
//! parse (strict JSON schema), validate (referential and value checks),
//! materialize (substitution, mount canonicalization, stage computation).

pub mod materialize;
pub mod parser;
pub mod validate;

pub use materialize::{
    materialize_component_spec, materialize_flow_spec, materialize_mount_bindings,
};
pub use parser::{
    parse_component_spec, parse_component_spec_str, parse_flow_spec, parse_flow_spec_str,
};
pub use validate::{validate_component_spec, validate_flow_spec};
