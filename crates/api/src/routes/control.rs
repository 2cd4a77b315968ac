use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{control, control_bindings};
use crate::state::AppState;

/// Routes mounted at `/control-bindings`.
pub fn bindings_router() -> Router<AppState> {
    Router::new()
        .route("/", delete(control_bindings::delete_binding))
        .route("/bind", post(control_bindings::bind_control))
        .route("/used", get(control_bindings::list_used))
}

/// Routes mounted at `/control`.
pub fn router() -> Router<AppState> {
    Router::new().route("/write", post(control::write_output))
}
