//! Route definitions for the `/calculations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::calculations;
use crate::state::AppState;

/// Routes mounted at `/calculations`.
///
/// ```text
/// GET    /                -> list_all
/// POST   /start           -> start
/// POST   /add-operation   -> add_operation
/// GET    /user/me         -> my_calculations
/// GET    /{id}            -> get_tree
/// DELETE /{id}            -> delete
/// GET    /{id}/authored   -> get_authored_tree
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(calculations::list_all))
        .route("/start", post(calculations::start))
        .route("/add-operation", post(calculations::add_operation))
        .route("/user/me", get(calculations::my_calculations))
        .route(
            "/{id}",
            get(calculations::get_tree).delete(calculations::delete),
        )
        .route("/{id}/authored", get(calculations::get_authored_tree))
}
