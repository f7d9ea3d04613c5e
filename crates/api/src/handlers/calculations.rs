//! Handlers for the `/calculations` resource.
//!
//! Thin adapters over [`calctree_core::engine::CalculationEngine`]: they
//! extract identity and input, and leave every rule to the engine.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use calctree_core::node::{AuthoredNode, CalculationNode};
use calctree_core::tree::TreeBranch;
use calctree_core::types::DbId;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, DeletedResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /calculations/start`.
///
/// Values are taken as raw JSON so a missing or non-numeric value reaches
/// the engine's validation instead of failing deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCalculationRequest {
    #[serde(default)]
    pub initial_value: Option<Value>,
}

/// Request body for `POST /calculations/add-operation`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOperationRequest {
    pub parent_id: DbId,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub input_value: Option<Value>,
}

/// JSON numbers only; strings such as `"5"` do not count.
fn as_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/calculations
///
/// Every calculation thread, newest first, with authors attached.
pub async fn list_all(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<TreeBranch<AuthoredNode>>>>> {
    let trees = state.engine.get_all_calculations().await?;
    Ok(Json(DataResponse { data: trees }))
}

/// POST /api/v1/calculations/start
pub async fn start(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<StartCalculationRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CalculationNode>>)> {
    let root = state
        .engine
        .start_calculation(auth.user_id, as_number(input.initial_value.as_ref()))
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: root })))
}

/// POST /api/v1/calculations/add-operation
pub async fn add_operation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<AddOperationRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CalculationNode>>)> {
    let node = state
        .engine
        .add_operation(
            input.parent_id,
            input.operation.as_deref().unwrap_or_default(),
            as_number(input.input_value.as_ref()),
            auth.user_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: node })))
}

/// GET /api/v1/calculations/user/me
pub async fn my_calculations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<CalculationNode>>>> {
    let roots = state.engine.get_user_calculations(auth.user_id).await?;
    Ok(Json(DataResponse { data: roots }))
}

/// GET /api/v1/calculations/{id}
pub async fn get_tree(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(root_id): Path<DbId>,
) -> AppResult<Json<DataResponse<TreeBranch<CalculationNode>>>> {
    let tree = state.engine.get_calculation_tree(root_id).await?;
    Ok(Json(DataResponse { data: tree }))
}

/// GET /api/v1/calculations/{id}/authored
pub async fn get_authored_tree(
    State(state): State<AppState>,
    Path(root_id): Path<DbId>,
) -> AppResult<Json<DataResponse<TreeBranch<AuthoredNode>>>> {
    let tree = state.engine.get_authored_tree(root_id).await?;
    Ok(Json(DataResponse { data: tree }))
}

/// DELETE /api/v1/calculations/{id}
///
/// Only the user who started the thread may delete it.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(root_id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeletedResponse>>> {
    let deleted = state
        .engine
        .delete_calculation(root_id, auth.user_id)
        .await?;
    Ok(Json(DataResponse {
        data: DeletedResponse { deleted },
    }))
}
