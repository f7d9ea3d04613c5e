//! [`NodeStore`] implementation over PostgreSQL.

use async_trait::async_trait;
use calctree_core::error::CoreError;
use calctree_core::node::{AuthoredNode, CalculationNode, NewCalculationNode};
use calctree_core::store::NodeStore;
use calctree_core::types::DbId;

use crate::models::calculation_node::CreateCalculationNode;
use crate::repositories::CalculationNodeRepo;
use crate::DbPool;

/// Engine-facing store that delegates to [`CalculationNodeRepo`].
#[derive(Clone)]
pub struct PgNodeStore {
    pool: DbPool,
}

impl PgNodeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Log a database failure and hide it behind a storage error.
fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> CoreError {
    move |err| {
        tracing::error!(error = %err, context, "Calculation node query failed");
        CoreError::Storage(format!("{context}: {err}"))
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, CoreError>
where
    T: TryFrom<R, Error = CoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn create(&self, input: NewCalculationNode) -> Result<CalculationNode, CoreError> {
        let insert = CreateCalculationNode {
            root_id: input.root_id,
            parent_id: input.parent_id,
            operation: input.operation,
            input_value: input.input_value,
            calculated_value: input.calculated_value,
            depth: input.depth,
            user_id: input.user_id,
        };
        CalculationNodeRepo::create(&self.pool, &insert)
            .await
            .map_err(storage("insert node"))?
            .try_into()
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<CalculationNode>, CoreError> {
        CalculationNodeRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage("find node"))?
            .map(CalculationNode::try_from)
            .transpose()
    }

    async fn find_by_root_id(&self, root_id: DbId) -> Result<Vec<CalculationNode>, CoreError> {
        let rows = CalculationNodeRepo::find_by_root_id(&self.pool, root_id)
            .await
            .map_err(storage("load tree"))?;
        convert_all(rows)
    }

    async fn find_by_user_id(
        &self,
        user_id: DbId,
        root_only: bool,
    ) -> Result<Vec<CalculationNode>, CoreError> {
        let rows = CalculationNodeRepo::find_by_user_id(&self.pool, user_id, root_only)
            .await
            .map_err(storage("load user nodes"))?;
        convert_all(rows)
    }

    async fn update_root_id(&self, id: DbId, root_id: DbId) -> Result<(), CoreError> {
        let updated = CalculationNodeRepo::update_root_id(&self.pool, id, root_id)
            .await
            .map_err(storage("set root id"))?;
        if !updated {
            return Err(CoreError::NotFound {
                entity: "CalculationNode",
                id,
            });
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: DbId) -> Result<bool, CoreError> {
        CalculationNodeRepo::delete(&self.pool, id)
            .await
            .map_err(storage("delete node"))
    }

    async fn delete_by_root_id(&self, root_id: DbId) -> Result<u64, CoreError> {
        CalculationNodeRepo::delete_tree(&self.pool, root_id)
            .await
            .map_err(storage("delete tree"))
    }

    async fn count_by_root_id(&self, root_id: DbId) -> Result<i64, CoreError> {
        CalculationNodeRepo::count_by_root_id(&self.pool, root_id)
            .await
            .map_err(storage("count tree"))
    }

    async fn find_roots_with_authors(&self) -> Result<Vec<AuthoredNode>, CoreError> {
        let rows = CalculationNodeRepo::find_roots_with_authors(&self.pool)
            .await
            .map_err(storage("list roots"))?;
        convert_all(rows)
    }

    async fn find_by_root_id_with_authors(
        &self,
        root_id: DbId,
    ) -> Result<Vec<AuthoredNode>, CoreError> {
        let rows = CalculationNodeRepo::find_by_root_id_with_authors(&self.pool, root_id)
            .await
            .map_err(storage("load authored tree"))?;
        convert_all(rows)
    }
}
