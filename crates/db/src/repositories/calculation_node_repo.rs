//! Repository for the `calculation_nodes` table.

use calctree_core::types::DbId;
use sqlx::PgPool;

use crate::models::calculation_node::{AuthoredNodeRow, CalculationNodeRow, CreateCalculationNode};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, root_id, parent_id, operation, input_value, calculated_value, \
                        depth, user_id, created_at";

/// Node columns qualified with `n.` plus the author's public columns.
const AUTHORED_COLUMNS: &str = "n.id, n.root_id, n.parent_id, n.operation, n.input_value, \
                                 n.calculated_value, n.depth, n.user_id, n.created_at, \
                                 u.username, u.avatar_url";

/// Provides persistence for calculation nodes. Nodes are never updated in
/// place except for finalizing a new root's `root_id`.
pub struct CalculationNodeRepo;

impl CalculationNodeRepo {
    /// Insert a new node, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateCalculationNode,
    ) -> Result<CalculationNodeRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO calculation_nodes
                (root_id, parent_id, operation, input_value, calculated_value, depth, user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CalculationNodeRow>(&query)
            .bind(input.root_id)
            .bind(input.parent_id)
            .bind(input.operation.as_str())
            .bind(input.input_value)
            .bind(input.calculated_value)
            .bind(input.depth)
            .bind(input.user_id)
            .fetch_one(pool)
            .await
    }

    /// Find a node by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<CalculationNodeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM calculation_nodes WHERE id = $1");
        sqlx::query_as::<_, CalculationNodeRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All nodes of one tree, oldest first.
    pub async fn find_by_root_id(
        pool: &PgPool,
        root_id: DbId,
    ) -> Result<Vec<CalculationNodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calculation_nodes
             WHERE root_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, CalculationNodeRow>(&query)
            .bind(root_id)
            .fetch_all(pool)
            .await
    }

    /// Nodes created by a user, newest first.
    ///
    /// With `root_only`, only finalized roots are returned.
    pub async fn find_by_user_id(
        pool: &PgPool,
        user_id: DbId,
        root_only: bool,
    ) -> Result<Vec<CalculationNodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calculation_nodes
             WHERE user_id = $1
               AND (NOT $2 OR (parent_id IS NULL AND root_id = id))
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, CalculationNodeRow>(&query)
            .bind(user_id)
            .bind(root_only)
            .fetch_all(pool)
            .await
    }

    /// Set `root_id` on a node. Returns `true` if the row was updated.
    pub async fn update_root_id(
        pool: &PgPool,
        id: DbId,
        root_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE calculation_nodes SET root_id = $2 WHERE id = $1")
            .bind(id)
            .bind(root_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a node; descendants follow through `ON DELETE CASCADE`.
    ///
    /// Returns `true` if the row existed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM calculation_nodes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every node of a tree in one transaction.
    ///
    /// The root row is locked first so concurrent deletes of the same tree
    /// serialize. Returns the number of rows removed.
    pub async fn delete_tree(pool: &PgPool, root_id: DbId) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT id FROM calculation_nodes WHERE id = $1 FOR UPDATE")
            .bind(root_id)
            .fetch_optional(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM calculation_nodes WHERE root_id = $1")
            .bind(root_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Count the nodes currently stored under a root.
    pub async fn count_by_root_id(pool: &PgPool, root_id: DbId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM calculation_nodes WHERE root_id = $1")
                .bind(root_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }

    /// All finalized roots with their authors, newest first.
    pub async fn find_roots_with_authors(
        pool: &PgPool,
    ) -> Result<Vec<AuthoredNodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {AUTHORED_COLUMNS}
             FROM calculation_nodes n
             JOIN users u ON u.id = n.user_id
             WHERE n.parent_id IS NULL AND n.root_id = n.id
             ORDER BY n.created_at DESC, n.id DESC"
        );
        sqlx::query_as::<_, AuthoredNodeRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// All nodes of one tree with their authors, oldest first.
    pub async fn find_by_root_id_with_authors(
        pool: &PgPool,
        root_id: DbId,
    ) -> Result<Vec<AuthoredNodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {AUTHORED_COLUMNS}
             FROM calculation_nodes n
             JOIN users u ON u.id = n.user_id
             WHERE n.root_id = $1
             ORDER BY n.created_at ASC, n.id ASC"
        );
        sqlx::query_as::<_, AuthoredNodeRow>(&query)
            .bind(root_id)
            .fetch_all(pool)
            .await
    }
}
