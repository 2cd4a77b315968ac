//! Handler for device telemetry pushes.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use coreflex_core::error::CoreError;
use coreflex_core::telemetry::DeviceModel;
use coreflex_db::models::device::DeviceState;
use coreflex_db::repositories::DeviceStateRepo;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::middleware::ingest::IngestKey;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /telemetry/{model}/{device_id}
///
/// Keys the model does not report are dropped and legacy input aliases are
/// renamed before the values are merged into the device's stored state and
/// the live cache. Unknown devices are registered on first report.
pub async fn ingest(
    State(state): State<AppState>,
    _key: IngestKey,
    Path((model, device_id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> AppResult<Json<DataResponse<DeviceState>>> {
    let model = DeviceModel::parse(&model)
        .ok_or_else(|| CoreError::Validation(format!("Unknown device model '{model}'")))?;
    let device_id = device_id.trim();
    if device_id.is_empty() {
        return Err(AppError::BadRequest("device_id is required".to_string()));
    }
    let Value::Object(raw) = payload else {
        return Err(AppError::BadRequest("Telemetry body must be a JSON object".to_string()));
    };

    let values = model.sanitize(&raw);
    let device = DeviceStateRepo::record_telemetry(&state.pool, device_id, model, &values).await?;
    state.live_cache.record(device_id, model, &values, Utc::now());

    tracing::debug!(device_id, model = %model, keys = values.len(), "Telemetry recorded");
    Ok(Json(DataResponse { data: device }))
}
