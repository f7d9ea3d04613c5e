//! Calculation node rows and their conversion into core records.

use calctree_core::calculation::Operation;
use calctree_core::error::CoreError;
use calctree_core::node::{AuthorIdentity, AuthoredNode, CalculationNode};
use calctree_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// Full row from the `calculation_nodes` table.
///
/// `operation` is stored as text and checked by a `CHECK` constraint; it is
/// parsed into [`Operation`] on conversion.
#[derive(Debug, Clone, FromRow)]
pub struct CalculationNodeRow {
    pub id: DbId,
    pub root_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub operation: String,
    pub input_value: f64,
    pub calculated_value: f64,
    pub depth: i32,
    pub user_id: DbId,
    pub created_at: Timestamp,
}

/// Node row joined with the author's public columns from `users`.
#[derive(Debug, Clone, FromRow)]
pub struct AuthoredNodeRow {
    #[sqlx(flatten)]
    pub node: CalculationNodeRow,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Insert DTO. `id` and `created_at` come from column defaults.
#[derive(Debug, Clone)]
pub struct CreateCalculationNode {
    pub root_id: Option<DbId>,
    pub parent_id: Option<DbId>,
    pub operation: Operation,
    pub input_value: f64,
    pub calculated_value: f64,
    pub depth: i32,
    pub user_id: DbId,
}

impl TryFrom<CalculationNodeRow> for CalculationNode {
    type Error = CoreError;

    fn try_from(row: CalculationNodeRow) -> Result<Self, Self::Error> {
        let operation = row.operation.parse::<Operation>().map_err(|_| {
            CoreError::Storage(format!(
                "node {} has unknown operation '{}'",
                row.id, row.operation
            ))
        })?;
        Ok(CalculationNode {
            id: row.id,
            root_id: row.root_id,
            parent_id: row.parent_id,
            operation,
            input_value: row.input_value,
            calculated_value: row.calculated_value,
            depth: row.depth,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<AuthoredNodeRow> for AuthoredNode {
    type Error = CoreError;

    fn try_from(row: AuthoredNodeRow) -> Result<Self, Self::Error> {
        let author = AuthorIdentity {
            id: row.node.user_id,
            username: row.username,
            avatar_url: row.avatar_url,
        };
        Ok(AuthoredNode {
            node: row.node.try_into()?,
            author,
        })
    }
}
