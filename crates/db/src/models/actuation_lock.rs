//! Actuation lock rows.

use coreflex_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `actuation_locks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ActuationLock {
    pub lock_key: String,
    pub device_id: String,
    pub output_field: String,
    pub user_id: DbId,
    /// Identifies this holder; release only removes the row carrying it.
    pub lock_token: Uuid,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}
