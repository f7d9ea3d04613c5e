//! In-process [`NodeStore`] backed by a vector behind a lock.
//!
//! Mirrors the PostgreSQL adapter's observable behaviour (ordering, foreign
//! keys, atomic tree deletion) closely enough to exercise the engine without
//! a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CoreError;
use crate::node::{AuthorIdentity, AuthoredNode, CalculationNode, NewCalculationNode};
use crate::store::NodeStore;
use crate::types::DbId;

#[derive(Default)]
struct Inner {
    /// Insertion order doubles as creation order.
    nodes: Vec<CalculationNode>,
    authors: HashMap<DbId, AuthorIdentity>,
    /// Tree removed just before its nodes are next loaded.
    drop_before_load: Option<DbId>,
}

impl Inner {
    fn contains(&self, id: DbId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    fn author_of(&self, node: &CalculationNode) -> Result<AuthoredNode, CoreError> {
        let author = self.authors.get(&node.user_id).cloned().ok_or_else(|| {
            CoreError::Storage(format!("no author registered for user {}", node.user_id))
        })?;
        Ok(AuthoredNode {
            node: node.clone(),
            author,
        })
    }
}

/// Roots whose second start phase has not completed are not listed.
fn is_finalized_root(node: &CalculationNode) -> bool {
    node.is_root() && node.root_id == Some(node.id)
}

#[derive(Default)]
pub struct MemoryNodeStore {
    inner: RwLock<Inner>,
    fail_next_root_update: AtomicBool,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a user known to the author-joining queries.
    pub async fn register_author(&self, author: AuthorIdentity) {
        self.inner.write().await.authors.insert(author.id, author);
    }

    /// Cause the next [`NodeStore::update_root_id`] call to fail.
    pub fn fail_next_root_update(&self) {
        self.fail_next_root_update.store(true, Ordering::SeqCst);
    }

    /// Delete the tree rooted at `root_id` right before the next
    /// [`NodeStore::find_by_root_id_with_authors`] call for it, as a
    /// concurrent delete landing between listing and loading would.
    pub async fn drop_tree_before_load(&self, root_id: DbId) {
        self.inner.write().await.drop_before_load = Some(root_id);
    }

    /// Total number of stored nodes across all trees.
    pub async fn len(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn create(&self, input: NewCalculationNode) -> Result<CalculationNode, CoreError> {
        let mut inner = self.inner.write().await;
        for reference in [input.parent_id, input.root_id].into_iter().flatten() {
            if !inner.contains(reference) {
                return Err(CoreError::Storage(format!(
                    "foreign key violation: node {reference} does not exist"
                )));
            }
        }
        let node = CalculationNode {
            id: Uuid::new_v4(),
            root_id: input.root_id,
            parent_id: input.parent_id,
            operation: input.operation,
            input_value: input.input_value,
            calculated_value: input.calculated_value,
            depth: input.depth,
            user_id: input.user_id,
            created_at: Utc::now(),
        };
        inner.nodes.push(node.clone());
        Ok(node)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<CalculationNode>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner.nodes.iter().find(|n| n.id == id).cloned())
    }

    async fn find_by_root_id(&self, root_id: DbId) -> Result<Vec<CalculationNode>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .iter()
            .filter(|n| n.root_id == Some(root_id))
            .cloned()
            .collect())
    }

    async fn find_by_user_id(
        &self,
        user_id: DbId,
        root_only: bool,
    ) -> Result<Vec<CalculationNode>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!root_only || is_finalized_root(n)))
            .cloned()
            .collect())
    }

    async fn update_root_id(&self, id: DbId, root_id: DbId) -> Result<(), CoreError> {
        if self.fail_next_root_update.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Storage("injected root update failure".into()));
        }
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(CoreError::NotFound {
                entity: "CalculationNode",
                id,
            })?;
        node.root_id = Some(root_id);
        Ok(())
    }

    async fn delete_by_id(&self, id: DbId) -> Result<bool, CoreError> {
        let mut inner = self.inner.write().await;
        if !inner.contains(id) {
            return Ok(false);
        }
        // Cascade through parent references, like the foreign key does.
        let mut doomed = std::collections::HashSet::from([id]);
        loop {
            let before = doomed.len();
            for node in &inner.nodes {
                if node.parent_id.is_some_and(|p| doomed.contains(&p)) {
                    doomed.insert(node.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }
        inner.nodes.retain(|n| !doomed.contains(&n.id));
        Ok(true)
    }

    async fn delete_by_root_id(&self, root_id: DbId) -> Result<u64, CoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.nodes.len();
        inner.nodes.retain(|n| n.root_id != Some(root_id));
        Ok((before - inner.nodes.len()) as u64)
    }

    async fn count_by_root_id(&self, root_id: DbId) -> Result<i64, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .nodes
            .iter()
            .filter(|n| n.root_id == Some(root_id))
            .count() as i64)
    }

    async fn find_roots_with_authors(&self) -> Result<Vec<AuthoredNode>, CoreError> {
        let inner = self.inner.read().await;
        inner
            .nodes
            .iter()
            .rev()
            .filter(|n| is_finalized_root(n))
            .map(|n| inner.author_of(n))
            .collect()
    }

    async fn find_by_root_id_with_authors(
        &self,
        root_id: DbId,
    ) -> Result<Vec<AuthoredNode>, CoreError> {
        let mut inner = self.inner.write().await;
        if inner.drop_before_load == Some(root_id) {
            inner.drop_before_load = None;
            inner.nodes.retain(|n| n.root_id != Some(root_id));
        }
        inner
            .nodes
            .iter()
            .filter(|n| n.root_id == Some(root_id))
            .map(|n| inner.author_of(n))
            .collect()
    }
}
