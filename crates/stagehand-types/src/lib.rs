//! Shared types for the stagehand orchestrator.
//!
//! Pure data types used across the store, engine, and CLI crates:
//! identifier newtypes, persisted metadata records, and the component/flow
//! specification value objects. Kept in a leaf crate so the store and
//! engine can share them without circular dependencies.

pub mod error;
pub mod id;
pub mod record;
pub mod spec;

// Top-level re-exports for convenience.
pub use error::SpecError;
pub use id::{BuildId, ComponentId, ExecutionId, FlowId, StepName};
pub use record::{BuildRecord, ComponentKind, ComponentRecord, ExecutionRecord, FlowRecord};
pub use spec::{ComponentSpec, FlowSpec, MountBinding, MountMethod, MountPoint};

/// Common imports for typical usage.
///
/// ```
/// use stagehand_types::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::SpecError;
    pub use crate::id::{BuildId, ComponentId, ExecutionId, FlowId, StepName};
    pub use crate::record::{
        BuildRecord, ComponentKind, ComponentRecord, ExecutionRecord, FlowRecord,
    };
    pub use crate::spec::{ComponentSpec, FlowSpec, MountBinding, MountMethod, MountPoint};
}
