pub mod auth;
pub mod calculations;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/register                     register (public)
/// /auth/login                        login (public)
///
/// /users                             list (admin only)
/// /users/profile                     get, update own profile
/// /users/{id}                        delete (self or admin)
///
/// /calculations                      list every thread (public)
/// /calculations/start                start a thread
/// /calculations/add-operation        reply to a node
/// /calculations/user/me              caller's threads
/// /calculations/{id}                 get tree, delete (owner only)
/// /calculations/{id}/authored        tree with authors (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/calculations", calculations::router())
}
