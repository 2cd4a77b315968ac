use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// Routes mounted at `/devices`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(devices::list_claimed))
        .route("/claim", post(devices::claim_device))
        .route("/{device_id}/claim", delete(devices::unclaim_device))
        .route("/{device_id}/live", get(devices::live_values))
}
