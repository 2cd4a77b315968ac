//! Handlers for `/devices`: claim bookkeeping and live values.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use coreflex_core::error::CoreError;
use coreflex_core::telemetry::LiveSnapshot;
use coreflex_db::models::device::{
    ClaimDevice, ClaimResult, DeviceState, DeviceStateSummary, UnclaimResult,
};
use coreflex_db::repositories::DeviceStateRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /devices
pub async fn list_claimed(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<DeviceState>>>> {
    let devices = DeviceStateRepo::list_claimed(&state.pool, auth.user_id).await?;
    Ok(Json(DataResponse { data: devices }))
}

/// POST /devices/claim
pub async fn claim_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ClaimDevice>,
) -> AppResult<Json<DataResponse<DeviceStateSummary>>> {
    let device_id = input.device_id.trim();
    if device_id.is_empty() {
        return Err(AppError::BadRequest("device_id is required".to_string()));
    }

    match DeviceStateRepo::claim(&state.pool, auth.user_id, device_id).await? {
        ClaimResult::Claimed(summary) => {
            tracing::info!(user_id = auth.user_id, device_id, "Device claimed");
            Ok(Json(DataResponse { data: summary }))
        }
        ClaimResult::ClaimedByOther => Err(CoreError::Conflict(format!(
            "Device {device_id} is already claimed"
        ))
        .into()),
        ClaimResult::NotFound => Err(CoreError::not_found("Device", device_id).into()),
    }
}

/// DELETE /devices/{device_id}/claim
pub async fn unclaim_device(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<StatusCode> {
    match DeviceStateRepo::unclaim(&state.pool, auth.user_id, &device_id).await? {
        UnclaimResult::Released => {
            tracing::info!(user_id = auth.user_id, device_id = %device_id, "Device released");
            Ok(StatusCode::NO_CONTENT)
        }
        UnclaimResult::NotOwner => {
            Err(CoreError::Forbidden("Device not claimed by this account".to_string()).into())
        }
        UnclaimResult::NotFound => Err(CoreError::not_found("Device", device_id).into()),
    }
}

/// GET /devices/{device_id}/live
///
/// Latest values from the in-process cache, for the claiming tenant only.
pub async fn live_values(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<Json<DataResponse<LiveSnapshot>>> {
    if !DeviceStateRepo::is_claimed_by(&state.pool, auth.user_id, &device_id).await? {
        return Err(CoreError::Forbidden("Device not authorized".to_string()).into());
    }

    let snapshot = state
        .live_cache
        .get(&device_id)
        .ok_or_else(|| CoreError::not_found("LiveSnapshot", &device_id))?;
    Ok(Json(DataResponse { data: snapshot }))
}
