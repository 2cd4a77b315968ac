use std::time::Duration;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use coreflex_core::counter_tick::max_delta_secs;
use coreflex_core::types::Timestamp;
use serde::Serialize;

use crate::engine::counter_tick::TickHeartbeat;
use crate::state::AppState;

/// State of the background counter tick engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickEngineStatus {
    /// No pass has completed yet.
    Starting,
    /// A pass completed within the clamp window.
    Running,
    /// Passes used to complete but the last one is too old.
    Stalled,
}

impl TickEngineStatus {
    /// A pass older than the per-tick clamp means counters are losing time.
    pub fn of(heartbeat: &TickHeartbeat, interval: Duration, now: Timestamp) -> Self {
        let window = Duration::from_secs(max_delta_secs(interval).unsigned_abs());
        if heartbeat.last_pass_at().is_none() {
            Self::Starting
        } else if heartbeat.is_fresh(now, window) {
            Self::Running
        } else {
            Self::Stalled
        }
    }
}

#[derive(Serialize)]
pub struct TickEngineHealth {
    pub status: TickEngineStatus,
    pub interval_ms: u64,
    pub last_pass_at: Option<Timestamp>,
    pub passes: u64,
    pub failures: u64,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is down or the tick engine
    /// has stalled.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub tick_engine: TickEngineHealth,
    /// Devices with telemetry in the live cache.
    pub live_devices: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = coreflex_db::health_check(&state.pool).await.is_ok();

    let heartbeat = &state.tick_heartbeat;
    let interval = state.config.counter_tick_interval;
    let engine_status = TickEngineStatus::of(heartbeat, interval, Utc::now());

    let status = if db_healthy && engine_status != TickEngineStatus::Stalled {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        tick_engine: TickEngineHealth {
            status: engine_status,
            interval_ms: interval.as_millis() as u64,
            last_pass_at: heartbeat.last_pass_at(),
            passes: heartbeat.passes(),
            failures: heartbeat.failures(),
        },
        live_devices: state.live_cache.len(),
    })
}

/// Mount health check routes (root-level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
