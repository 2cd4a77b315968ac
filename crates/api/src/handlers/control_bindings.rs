//! Handlers for `/control-bindings`: which output relay a control widget
//! drives.

use axum::extract::{Query, State};
use axum::Json;
use coreflex_core::actuation::{ControlWidgetType, OutputField};
use coreflex_core::error::CoreError;
use coreflex_db::models::control_binding::{
    BindControl, ControlBinding, DeleteBindingQuery, UsedOutput, UsedOutputsQuery,
};
use coreflex_db::repositories::{
    BindOutcome, ControlBindingInput, ControlBindingRepo, DeviceStateRepo,
};
use serde::Serialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for `DELETE /control-bindings`.
#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u8,
}

/// POST /control-bindings/bind
pub async fn bind_control(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<BindControl>,
) -> AppResult<Json<DataResponse<ControlBinding>>> {
    input.validate()?;

    let field = OutputField::parse(&input.field)
        .ok_or_else(|| AppError::BadRequest("Invalid DO field".to_string()))?;
    let widget_type = ControlWidgetType::parse(&input.widget_type)
        .ok_or_else(|| AppError::BadRequest("Invalid widget_type".to_string()))?;
    let device_id = input.device_id.trim();
    let title = input.title.as_deref().map(str::trim).filter(|t| !t.is_empty());

    if !DeviceStateRepo::is_claimed_by(&state.pool, auth.user_id, device_id).await? {
        return Err(CoreError::Forbidden("Device not authorized".to_string()).into());
    }

    let outcome = ControlBindingRepo::bind(
        &state.pool,
        &ControlBindingInput {
            user_id: auth.user_id,
            dashboard_id: input.dashboard_id.trim(),
            widget_id: input.widget_id.trim(),
            widget_type,
            title,
            device_id,
            field,
        },
    )
    .await?;

    match outcome {
        BindOutcome::Bound(binding) => {
            tracing::info!(
                binding_id = binding.id,
                user_id = auth.user_id,
                device_id,
                field = %field,
                "Control widget bound",
            );
            Ok(Json(DataResponse { data: binding }))
        }
        BindOutcome::OutputInUse { widget_id } => Err(AppError::OutputInUse { widget_id }),
    }
}

/// GET /control-bindings/used?dashboard_id=&device_id=
pub async fn list_used(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<UsedOutputsQuery>,
) -> AppResult<Json<DataResponse<Vec<UsedOutput>>>> {
    let used = ControlBindingRepo::list_used(
        &state.pool,
        auth.user_id,
        params.dashboard_id.trim(),
        params.device_id.trim(),
    )
    .await?;
    Ok(Json(DataResponse { data: used }))
}

/// DELETE /control-bindings?dashboard_id=&widget_id=
///
/// Idempotent: deleting an absent binding reports `deleted: 0`.
pub async fn delete_binding(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<DeleteBindingQuery>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    let removed = ControlBindingRepo::delete(
        &state.pool,
        auth.user_id,
        params.dashboard_id.trim(),
        params.widget_id.trim(),
    )
    .await?;
    Ok(Json(DataResponse {
        data: DeletedCount {
            deleted: u8::from(removed),
        },
    }))
}
