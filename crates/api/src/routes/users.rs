//! Route definitions for the `/users` resource.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::users;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// GET    /          -> list_users (admin)
/// GET    /profile   -> get_profile
/// PUT    /profile   -> update_profile
/// DELETE /{id}      -> delete_user
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list_users))
        .route(
            "/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/{id}", delete(users::delete_user))
}
