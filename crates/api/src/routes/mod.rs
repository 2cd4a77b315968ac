pub mod control;
pub mod counters;
pub mod devices;
pub mod health;
pub mod telemetry;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /device-counters                                  list (GET), delete (DELETE)
/// /device-counters/create-placeholder               idempotent placeholder (POST)
/// /device-counters/by-dashboard/{dashboard_id}      list for one dashboard
/// /device-counters/by-widget/{widget_id}            single counter
/// /device-counters/upsert                           bind device input (POST)
/// /device-counters/reset                            zero totals (POST)
///
/// /control-bindings                                 delete (DELETE)
/// /control-bindings/bind                            bind widget to output (POST)
/// /control-bindings/used                            outputs taken on a dashboard
///
/// /control/write                                    lock-guarded output write (POST)
///
/// /devices                                          claimed devices
/// /devices/claim                                    claim (POST)
/// /devices/{device_id}/claim                        release (DELETE)
/// /devices/{device_id}/live                         cached live values
///
/// /telemetry/{model}/{device_id}                    device push (POST, ingest key)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/device-counters", counters::router())
        .nest("/control-bindings", control::bindings_router())
        .nest("/control", control::router())
        .nest("/devices", devices::router())
        .nest("/telemetry", telemetry::router())
}
