use axum::routing::{get, post};
use axum::Router;

use crate::handlers::counters;
use crate::state::AppState;

/// Routes mounted at `/device-counters`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(counters::list_counters).delete(counters::delete_counter),
        )
        .route("/create-placeholder", post(counters::create_placeholder))
        .route("/by-dashboard/{dashboard_id}", get(counters::list_by_dashboard))
        .route("/by-widget/{widget_id}", get(counters::get_by_widget))
        .route("/upsert", post(counters::upsert_counter))
        .route("/reset", post(counters::reset_counter))
}
