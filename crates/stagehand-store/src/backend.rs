//! Metadata store trait definition.
//!
//! [`MetadataStore`] defines the storage contract for component, flow,
//! build, and execution metadata. Model types live in
//! [`stagehand_types::record`]. Methods are synchronous; async callers run
//! them on a blocking thread.

use stagehand_types::id::{BuildId, ComponentId, FlowId};
use stagehand_types::record::{BuildRecord, ComponentRecord, ExecutionRecord, FlowRecord};

use crate::error;

/// Storage contract for orchestrator metadata.
///
/// Every mutation is transactional: callers never observe a half-applied
/// change. Implementations must be `Send + Sync` for use behind
/// `Arc<dyn MetadataStore>`.
pub trait MetadataStore: Send + Sync {
    /// Insert a component row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`](crate::StoreError::Sqlite) on storage
    /// failure, including a duplicate id.
    fn insert_component(&self, component: &ComponentRecord) -> error::Result<()>;

    /// Fetch one component by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ComponentNotFound`](crate::StoreError::ComponentNotFound)
    /// when no row matches.
    fn select_component(&self, id: &ComponentId) -> error::Result<ComponentRecord>;

    /// All registered components, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_components(&self) -> error::Result<Vec<ComponentRecord>>;

    /// Delete one component by id. A leaf operation: builds and executions
    /// referencing the component are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ComponentNotFound`](crate::StoreError::ComponentNotFound)
    /// when no row matches.
    fn delete_component(&self, id: &ComponentId) -> error::Result<()>;

    /// Insert a flow row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`](crate::StoreError::Sqlite) on storage
    /// failure, including a duplicate id.
    fn insert_flow(&self, flow: &FlowRecord) -> error::Result<()>;

    /// Fetch one flow by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::FlowNotFound`](crate::StoreError::FlowNotFound)
    /// when no row matches.
    fn select_flow(&self, id: &FlowId) -> error::Result<FlowRecord>;

    /// All registered flows, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_flows(&self) -> error::Result<Vec<FlowRecord>>;

    /// Insert a build row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`](crate::StoreError::Sqlite) on storage
    /// failure, including a duplicate id.
    fn insert_build(&self, build: &BuildRecord) -> error::Result<()>;

    /// Fetch one build by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BuildNotFound`](crate::StoreError::BuildNotFound)
    /// when no row matches.
    fn select_build(&self, id: &BuildId) -> error::Result<BuildRecord>;

    /// Builds, optionally restricted to one component.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_builds(&self, component: Option<&ComponentId>) -> error::Result<Vec<BuildRecord>>;

    /// The most recently created build of a component.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BuildNotFound`](crate::StoreError::BuildNotFound)
    /// when the component has no builds.
    fn select_latest_build(&self, component: &ComponentId) -> error::Result<BuildRecord>;

    /// Insert an execution row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`](crate::StoreError::Sqlite) on storage
    /// failure, including a duplicate id.
    fn insert_execution(&self, execution: &ExecutionRecord) -> error::Result<()>;

    /// Executions, optionally restricted to one flow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_executions(&self, flow: Option<&FlowId>) -> error::Result<Vec<ExecutionRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn MetadataStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn MetadataStore) {}
    }
}
