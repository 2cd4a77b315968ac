//! Handler for `POST /control/write`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use coreflex_db::models::control_binding::WriteOutputRequest;
use serde_json::json;
use validator::Validate;

use crate::engine::actuation::WriteResult;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// POST /control/write
///
/// - 200 `{status: "ok", ack}` when the gateway acknowledged.
/// - 202 `{status: "pending"}` when the gateway timed out or was
///   unreachable; the write may still land.
pub async fn write_output(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<WriteOutputRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let result = state
        .actuation
        .write_output(
            auth.user_id,
            input.dashboard_id.trim(),
            input.widget_id.trim(),
            input.value,
        )
        .await?;

    Ok(match result {
        WriteResult::Acknowledged(ack) => {
            (StatusCode::OK, Json(json!({ "status": "ok", "ack": ack })))
        }
        WriteResult::Pending => (StatusCode::ACCEPTED, Json(json!({ "status": "pending" }))),
    })
}
