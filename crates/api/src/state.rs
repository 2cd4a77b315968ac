use std::sync::Arc;

use coreflex_core::telemetry::LiveTelemetryCache;

use crate::config::ServerConfig;
use crate::engine::actuation::ActuationManager;
use crate::engine::counter_tick::TickHeartbeat;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: coreflex_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Lock-guarded output writes through the gateway.
    pub actuation: Arc<ActuationManager>,
    /// Latest telemetry per device, fed by ingestion.
    pub live_cache: Arc<LiveTelemetryCache>,
    /// Liveness of the background counter tick engine.
    pub tick_heartbeat: Arc<TickHeartbeat>,
}
