use axum::routing::post;
use axum::Router;

use crate::handlers::telemetry;
use crate::state::AppState;

/// Routes mounted at `/telemetry`.
pub fn router() -> Router<AppState> {
    Router::new().route("/{model}/{device_id}", post(telemetry::ingest))
}
