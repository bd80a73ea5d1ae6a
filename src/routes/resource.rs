//! Resource CRUD routes. The first path segment selects the resource; handlers resolve it against the registry.

use crate::handlers::resource::{create, delete as delete_handler, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:resource", get(list).post(create))
        .route("/:resource/:id", get(read).put(update).delete(delete_handler))
        .method_not_allowed_fallback(super::unknown_route)
        .with_state(state)
}
