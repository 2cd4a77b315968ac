//! Handlers for `/device-counters`.
//!
//! Dashboard scoping: an absent `dashboard_id` matches any dashboard, while
//! `main` or a blank value pins the tenant's main dashboard.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use coreflex_core::counter::{normalize_dashboard_id, DashboardScope, DigitalInput, Level};
use coreflex_core::error::CoreError;
use coreflex_db::models::counter::{
    CounterScopeQuery, CreatePlaceholderCounter, DeleteCounterQuery, DeviceCounter, ResetCounter,
    UpsertCounter,
};
use coreflex_db::repositories::{CounterBindingInput, CounterRepo, DeviceStateRepo};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /device-counters/create-placeholder
///
/// Returns 201 when a row was created and 200 when it already existed.
pub async fn create_placeholder(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreatePlaceholderCounter>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let widget_id = required(&input.widget_id, "widget_id")?;
    let dashboard_id = normalize_dashboard_id(input.dashboard_id.as_deref());

    let (counter, created) = CounterRepo::create_placeholder(
        &state.pool,
        auth.user_id,
        dashboard_id.as_deref(),
        widget_id,
    )
    .await?;

    if created {
        tracing::info!(
            counter_id = counter.id,
            user_id = auth.user_id,
            widget_id,
            "Counter placeholder created",
        );
    }
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(DataResponse { data: counter })))
}

/// GET /device-counters?dashboard_id=
pub async fn list_counters(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<CounterScopeQuery>,
) -> AppResult<Json<DataResponse<Vec<DeviceCounter>>>> {
    let scope = DashboardScope::from_param(params.dashboard_id.as_deref());
    let counters = CounterRepo::list(&state.pool, auth.user_id, &scope).await?;
    Ok(Json(DataResponse { data: counters }))
}

/// GET /device-counters/by-dashboard/{dashboard_id}
pub async fn list_by_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<String>,
) -> AppResult<Json<DataResponse<Vec<DeviceCounter>>>> {
    let dashboard_id = required(&dashboard_id, "dashboard_id")?;
    let scope = DashboardScope::from_param(Some(dashboard_id));
    let counters = CounterRepo::list(&state.pool, auth.user_id, &scope).await?;
    Ok(Json(DataResponse { data: counters }))
}

/// GET /device-counters/by-widget/{widget_id}?dashboard_id=
pub async fn get_by_widget(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<String>,
    Query(params): Query<CounterScopeQuery>,
) -> AppResult<Json<DataResponse<DeviceCounter>>> {
    let widget_id = required(&widget_id, "widget_id")?;
    let scope = DashboardScope::from_param(params.dashboard_id.as_deref());
    let counter = find_counter(&state, auth.user_id, &scope, widget_id).await?;
    Ok(Json(DataResponse { data: counter }))
}

/// POST /device-counters/upsert
///
/// Binds the counter to a device input. Changing device or field resets
/// the totals; `prev_level` is seeded from the input's current level so the
/// bind itself never registers as an edge.
pub async fn upsert_counter(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<UpsertCounter>,
) -> AppResult<Json<DataResponse<DeviceCounter>>> {
    input.validate()?;
    let widget_id = required(&input.widget_id, "widget_id")?;
    let device_id = required(&input.device_id, "device_id")?;
    let field = DigitalInput::normalize(&input.field).ok_or_else(|| {
        AppError::BadRequest("field must be di1..di6 (or legacy in1..in6)".to_string())
    })?;
    let scope = DashboardScope::from_param(input.dashboard_id.as_deref());

    let current_level =
        DeviceStateRepo::read_level(&state.pool, auth.user_id, device_id, field).await?;

    let counter = CounterRepo::upsert_binding(
        &state.pool,
        &CounterBindingInput {
            user_id: auth.user_id,
            scope: &scope,
            widget_id,
            device_id,
            field,
            enabled: input.enabled,
            current_level,
        },
    )
    .await?;

    tracing::info!(
        counter_id = counter.id,
        user_id = auth.user_id,
        device_id,
        field = %field,
        enabled = counter.enabled,
        "Counter bound",
    );
    Ok(Json(DataResponse { data: counter }))
}

/// POST /device-counters/reset
pub async fn reset_counter(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ResetCounter>,
) -> AppResult<Json<DataResponse<DeviceCounter>>> {
    input.validate()?;
    let widget_id = required(&input.widget_id, "widget_id")?;
    let scope = DashboardScope::from_param(input.dashboard_id.as_deref());
    let counter = find_counter(&state, auth.user_id, &scope, widget_id).await?;

    let current_level = match DigitalInput::normalize(&counter.field) {
        Some(field) if !counter.device_id.trim().is_empty() => {
            DeviceStateRepo::read_level(&state.pool, auth.user_id, &counter.device_id, field)
                .await?
        }
        _ => Level::Low,
    };

    let counter = CounterRepo::reset(&state.pool, counter.id, current_level)
        .await?
        .ok_or_else(|| CoreError::not_found("DeviceCounter", widget_id))?;

    tracing::info!(counter_id = counter.id, user_id = auth.user_id, "Counter reset");
    Ok(Json(DataResponse { data: counter }))
}

/// DELETE /device-counters?widget_id=&dashboard_id=
pub async fn delete_counter(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<DeleteCounterQuery>,
) -> AppResult<StatusCode> {
    let widget_id = required(&params.widget_id, "widget_id")?;
    let scope = DashboardScope::from_param(params.dashboard_id.as_deref());

    let deleted =
        CounterRepo::delete_by_widget(&state.pool, auth.user_id, &scope, widget_id).await?;
    if deleted.is_empty() {
        return Err(CoreError::not_found("DeviceCounter", widget_id).into());
    }

    tracing::info!(
        user_id = auth.user_id,
        widget_id,
        rows = deleted.len(),
        "Counter deleted",
    );
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn required<'a>(value: &'a str, name: &str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{name} is required")));
    }
    Ok(trimmed)
}

async fn find_counter(
    state: &AppState,
    user_id: i64,
    scope: &DashboardScope,
    widget_id: &str,
) -> AppResult<DeviceCounter> {
    CounterRepo::find_by_widget(&state.pool, user_id, scope, widget_id)
        .await?
        .ok_or_else(|| CoreError::not_found("DeviceCounter", widget_id).into())
}
