//! Handlers for the `/users` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use calctree_core::error::CoreError;
use calctree_core::types::DbId;
use calctree_core::users::{validate_avatar_url, validate_username};
use calctree_db::models::user::{UpdateUser, UserResponse};
use calctree_db::repositories::UserRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

fn user_not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "User", id })
}

/// GET /api/v1/users/profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| user_not_found(auth.user_id))?;
    Ok(Json(DataResponse { data: user.into() }))
}

/// PUT /api/v1/users/profile
///
/// Change the caller's username and/or avatar URL. Omitted fields are kept.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpdateUser>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    if let Some(username) = &input.username {
        validate_username(username)?;
        if let Some(existing) = UserRepo::find_by_username(&state.pool, username).await? {
            if existing.id != auth.user_id {
                return Err(AppError::Core(CoreError::Conflict(
                    "Username already taken".into(),
                )));
            }
        }
    }
    if let Some(avatar_url) = &input.avatar_url {
        validate_avatar_url(avatar_url)?;
    }

    let user = UserRepo::update(&state.pool, auth.user_id, &input)
        .await?
        .ok_or_else(|| user_not_found(auth.user_id))?;

    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(Json(DataResponse { data: user.into() }))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = UserRepo::list(&state.pool).await?;
    Ok(Json(DataResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
    }))
}

/// DELETE /api/v1/users/{id}
///
/// Users may delete their own account; admins may delete any account.
/// The account's calculation nodes are removed with it.
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if auth.user_id != id && !auth.is_admin() {
        return Err(AppError::Core(CoreError::Forbidden(
            "Unauthorized to delete this user".into(),
        )));
    }

    if !UserRepo::delete(&state.pool, id).await? {
        return Err(user_not_found(id));
    }

    tracing::info!(user_id = %id, deleted_by = %auth.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
