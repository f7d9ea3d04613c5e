//! Calculation engine: the operations users perform on calculation threads.
//!
//! The engine is stateless. Every operation runs against the injected
//! [`NodeStore`] and surfaces store failures unchanged.

use std::sync::Arc;

use futures::future::join_all;

use crate::calculation::{compute, into_checked, validate, validate_reply, Operation};
use crate::error::CoreError;
use crate::node::{AuthoredNode, CalculationNode, NewCalculationNode};
use crate::store::NodeStore;
use crate::tree::{build_tree, TreeBranch, MAX_TREE_DEPTH};
use crate::types::DbId;

/// Entity name used in `NotFound` errors for whole trees.
const ENTITY_CALCULATION: &str = "Calculation";
/// Entity name used in `NotFound` errors for individual nodes.
const ENTITY_NODE: &str = "CalculationNode";

pub struct CalculationEngine {
    store: Arc<dyn NodeStore>,
}

impl CalculationEngine {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Start a new calculation thread with `initial_value` as its root.
    ///
    /// The store assigns the root's id, so the self-referencing `root_id` is
    /// written in a second step. If that step fails the half-created node is
    /// removed again and the failure is returned.
    pub async fn start_calculation(
        &self,
        owner_id: DbId,
        initial_value: Option<f64>,
    ) -> Result<CalculationNode, CoreError> {
        let start = Operation::Start.as_str();
        let (operation, value) =
            into_checked(validate(start, initial_value), start, initial_value)?;
        let calculated_value = compute(value, operation, value)?;

        let created = self
            .store
            .create(NewCalculationNode {
                root_id: None,
                parent_id: None,
                operation,
                input_value: value,
                calculated_value,
                depth: 0,
                user_id: owner_id,
            })
            .await?;

        if let Err(err) = self.store.update_root_id(created.id, created.id).await {
            tracing::warn!(node_id = %created.id, error = %err, "Root finalization failed, removing node");
            if let Err(cleanup) = self.store.delete_by_id(created.id).await {
                tracing::error!(node_id = %created.id, error = %cleanup, "Failed to remove unfinalized root");
            }
            return Err(err);
        }

        let root = self.store.find_by_id(created.id).await?.ok_or_else(|| {
            tracing::error!(node_id = %created.id, "Root node vanished after creation");
            CoreError::Inconsistent(format!("root node {} vanished after creation", created.id))
        })?;

        tracing::info!(root_id = %root.id, user_id = %owner_id, value, "Calculation started");
        Ok(root)
    }

    /// Append a reply applying `operation` with `input_value` to `parent_id`.
    ///
    /// The new node belongs to `owner_id`, which need not own the parent.
    pub async fn add_operation(
        &self,
        parent_id: DbId,
        operation: &str,
        input_value: Option<f64>,
        owner_id: DbId,
    ) -> Result<CalculationNode, CoreError> {
        let parent = self
            .store
            .find_by_id(parent_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY_NODE,
                id: parent_id,
            })?;
        // A root still waiting for its second start phase is not usable yet.
        let root_id = parent.root_id.ok_or(CoreError::NotFound {
            entity: ENTITY_NODE,
            id: parent_id,
        })?;

        let depth = parent.depth + 1;
        if usize::try_from(depth).map_or(true, |d| d > MAX_TREE_DEPTH) {
            return Err(CoreError::InvalidOperation(format!(
                "Reply chains are limited to {MAX_TREE_DEPTH} levels"
            )));
        }

        let (operation, value) =
            into_checked(validate_reply(operation, input_value), operation, input_value)?;
        let calculated_value = compute(parent.calculated_value, operation, value)?;
        if !calculated_value.is_finite() {
            return Err(CoreError::InvalidOperation(format!(
                "{} {} {value} does not produce a finite number",
                parent.calculated_value, operation
            )));
        }

        let node = self
            .store
            .create(NewCalculationNode {
                root_id: Some(root_id),
                parent_id: Some(parent.id),
                operation,
                input_value: value,
                calculated_value,
                depth,
                user_id: owner_id,
            })
            .await?;

        tracing::info!(
            node_id = %node.id,
            parent_id = %parent.id,
            root_id = %root_id,
            operation = %operation,
            calculated_value,
            "Operation added"
        );
        Ok(node)
    }

    /// Load every node of a tree and assemble it.
    pub async fn get_calculation_tree(
        &self,
        root_id: DbId,
    ) -> Result<TreeBranch<CalculationNode>, CoreError> {
        let nodes = self.store.find_by_root_id(root_id).await?;
        tracing::debug!(%root_id, node_count = nodes.len(), "Loaded calculation tree");
        build_tree(root_id, nodes)
    }

    /// Like [`Self::get_calculation_tree`], with each node's author attached.
    pub async fn get_authored_tree(
        &self,
        root_id: DbId,
    ) -> Result<TreeBranch<AuthoredNode>, CoreError> {
        let nodes = self.store.find_by_root_id_with_authors(root_id).await?;
        tracing::debug!(%root_id, node_count = nodes.len(), "Loaded authored tree");
        build_tree(root_id, nodes)
    }

    /// Root nodes started by `user_id`, newest first.
    pub async fn get_user_calculations(
        &self,
        user_id: DbId,
    ) -> Result<Vec<CalculationNode>, CoreError> {
        self.store.find_by_user_id(user_id, true).await
    }

    /// Delete a whole tree. Only the user who started it may do so.
    ///
    /// No node is removed when the ownership check fails.
    pub async fn delete_calculation(
        &self,
        root_id: DbId,
        requester_id: DbId,
    ) -> Result<bool, CoreError> {
        let not_found = CoreError::NotFound {
            entity: ENTITY_CALCULATION,
            id: root_id,
        };
        let root = self.store.find_by_id(root_id).await?.ok_or(not_found)?;
        if !root.is_root() {
            return Err(CoreError::NotFound {
                entity: ENTITY_CALCULATION,
                id: root_id,
            });
        }
        if root.user_id != requester_id {
            return Err(CoreError::Forbidden(
                "Unauthorized to delete this calculation".into(),
            ));
        }

        let removed = self.store.delete_by_root_id(root_id).await?;
        let remaining = self.store.count_by_root_id(root_id).await?;
        if remaining != 0 {
            tracing::error!(%root_id, removed, remaining, "Tree deletion left nodes behind");
            return Err(CoreError::Inconsistent(format!(
                "{remaining} nodes of tree {root_id} survived deletion"
            )));
        }

        tracing::info!(%root_id, user_id = %requester_id, removed, "Calculation deleted");
        Ok(true)
    }

    /// Every tree in the store, newest root first, authors attached per node.
    ///
    /// A tree deleted between listing the roots and loading its nodes is
    /// left out of the result.
    pub async fn get_all_calculations(&self) -> Result<Vec<TreeBranch<AuthoredNode>>, CoreError> {
        let roots = self.store.find_roots_with_authors().await?;
        let loads = roots.iter().map(|root| self.get_authored_tree(root.node.id));

        let mut trees = Vec::with_capacity(roots.len());
        for result in join_all(loads).await {
            match result {
                Ok(tree) => trees.push(tree),
                Err(CoreError::NotFound { id, .. }) => {
                    tracing::debug!(root_id = %id, "Tree removed while listing, skipping");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(trees)
    }
}
