use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use coreflex_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header devices (or their relay) present when pushing telemetry.
pub const INGEST_KEY_HEADER: &str = "x-ingest-key";

/// Passes when no ingest key is configured, or when the request carries
/// the configured key.
#[derive(Debug, Clone, Copy)]
pub struct IngestKey;

impl FromRequestParts<AppState> for IngestKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.ingest_api_key.as_deref() else {
            return Ok(IngestKey);
        };

        let presented = parts
            .headers
            .get(INGEST_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        if presented == Some(expected) {
            Ok(IngestKey)
        } else {
            Err(AppError::Core(CoreError::Unauthorized(
                "Missing or invalid ingest key".into(),
            )))
        }
    }
}
