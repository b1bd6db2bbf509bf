//! Metadata store error types.

use stagehand_types::id::{BuildId, ComponentId, FlowId};

/// Errors produced by [`MetadataStore`](crate::MetadataStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A single-row component lookup matched nothing.
    #[error("component '{0}' not found")]
    ComponentNotFound(ComponentId),

    /// A single-row build lookup matched nothing.
    #[error("build '{0}' not found")]
    BuildNotFound(BuildId),

    /// A single-row flow lookup matched nothing.
    #[error("flow '{0}' not found")]
    FlowNotFound(FlowId),

    /// `init_store` was pointed at a state directory that already exists.
    #[error("state directory '{0}' already exists")]
    AlreadyInitialized(std::path::PathBuf),

    /// Underlying `SQLite` failure, including unique-constraint violations
    /// on duplicate primary ids.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the state directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("metadata store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// `true` for the single-row lookup misses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ComponentNotFound(_) | Self::BuildNotFound(_) | Self::FlowNotFound(_)
        )
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;
