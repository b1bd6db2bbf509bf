//! Metadata persistence for the stagehand orchestrator.
//!
//! Provides the [`MetadataStore`] trait and the SQLite implementation that
//! durably records components, flows, builds, and executions. The store is
//! the single point of serialization for state mutation: every write runs
//! inside a short transaction that either commits or rolls back.

pub mod backend;
pub mod error;
pub mod schema;
pub mod sqlite;

// Top-level re-exports for convenience.
pub use backend::MetadataStore;
pub use error::StoreError;
pub use sqlite::{init_store, SqliteMetadataStore, STORE_FILE_NAME};

/// Common imports for typical usage.
///
/// ```
/// use stagehand_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::MetadataStore;
    pub use crate::error::{Result, StoreError};
    pub use crate::sqlite::{init_store, SqliteMetadataStore};
    pub use stagehand_types::record::{
        BuildRecord, ComponentRecord, ExecutionRecord, FlowRecord,
    };
}
