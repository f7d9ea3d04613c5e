//! Calculation node records as the engine sees them.

use serde::Serialize;

use crate::calculation::Operation;
use crate::tree::TreeRecord;
use crate::types::{DbId, Timestamp};

/// A single persisted arithmetic step.
///
/// Nodes are immutable once created. The only field ever written after the
/// initial insert is `root_id` of a root node, during the second phase of
/// starting a calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationNode {
    pub id: DbId,
    /// Id of the tree's root. Equal to `id` for the root itself.
    ///
    /// `None` only for a root that has been inserted but not yet finalized;
    /// such a node is never handed out by the engine.
    pub root_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub operation: Operation,
    pub input_value: f64,
    pub calculated_value: f64,
    /// Distance from the root; `0` for the root itself.
    pub depth: i32,
    pub user_id: DbId,
    pub created_at: Timestamp,
}

impl CalculationNode {
    /// A root is the single parentless node of a tree.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Insert payload for a new node. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalculationNode {
    pub root_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub operation: Operation,
    pub input_value: f64,
    pub calculated_value: f64,
    pub depth: i32,
    pub user_id: DbId,
}

/// Public identity of a node's author, safe for unauthenticated readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorIdentity {
    pub id: DbId,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A node joined with the identity of whoever created it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthoredNode {
    #[serde(flatten)]
    pub node: CalculationNode,
    pub author: AuthorIdentity,
}

impl TreeRecord for CalculationNode {
    fn id(&self) -> DbId {
        self.id
    }

    fn root_id(&self) -> Option<DbId> {
        self.root_id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.parent_id
    }
}

impl TreeRecord for AuthoredNode {
    fn id(&self) -> DbId {
        self.node.id
    }

    fn root_id(&self) -> Option<DbId> {
        self.node.root_id
    }

    fn parent_id(&self) -> Option<DbId> {
        self.node.parent_id
    }
}
