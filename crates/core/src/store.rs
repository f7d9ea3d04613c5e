//! Persistence seam for calculation nodes.
//!
//! The engine never talks to a database directly. It drives any
//! [`NodeStore`] implementation: the PostgreSQL adapter in `calctree-db` in
//! production and [`crate::memory_store::MemoryNodeStore`] in tests.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::node::{AuthoredNode, CalculationNode, NewCalculationNode};
use crate::types::DbId;

/// Durable storage of flat calculation-node records.
///
/// Implementations must be `Send + Sync`; the engine shares one instance
/// across all request handlers. Store-level failures are reported as
/// [`CoreError::Storage`].
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Insert a node. The store assigns `id` and `created_at`.
    async fn create(&self, input: NewCalculationNode) -> Result<CalculationNode, CoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<CalculationNode>, CoreError>;

    /// Every node of one tree, oldest first.
    async fn find_by_root_id(&self, root_id: DbId) -> Result<Vec<CalculationNode>, CoreError>;

    /// Nodes created by `user_id`, newest first. With `root_only` set, only
    /// finalized roots are returned.
    async fn find_by_user_id(
        &self,
        user_id: DbId,
        root_only: bool,
    ) -> Result<Vec<CalculationNode>, CoreError>;

    /// Set `root_id` on an existing node. Fails with `NotFound` if absent.
    async fn update_root_id(&self, id: DbId, root_id: DbId) -> Result<(), CoreError>;

    /// Delete one node together with its descendants.
    ///
    /// Returns `true` if the node existed.
    async fn delete_by_id(&self, id: DbId) -> Result<bool, CoreError>;

    /// Delete every node sharing `root_id` as one atomic unit.
    ///
    /// Returns the number of nodes removed.
    async fn delete_by_root_id(&self, root_id: DbId) -> Result<u64, CoreError>;

    /// Number of nodes currently stored under `root_id`.
    async fn count_by_root_id(&self, root_id: DbId) -> Result<i64, CoreError>;

    /// Every finalized root joined with its author, newest first.
    async fn find_roots_with_authors(&self) -> Result<Vec<AuthoredNode>, CoreError>;

    /// Every node of one tree joined with its author, oldest first.
    async fn find_by_root_id_with_authors(
        &self,
        root_id: DbId,
    ) -> Result<Vec<AuthoredNode>, CoreError>;
}
