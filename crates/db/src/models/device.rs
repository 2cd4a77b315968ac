//! Device state rows (the device state store) and claim DTOs.

use coreflex_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `device_states` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceState {
    pub id: DbId,
    pub device_id: String,
    pub model: String,
    pub claimed_by_user_id: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
    pub status: String,
    pub last_seen: Option<Timestamp>,
    pub io_values: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Current values of one claimed device, as returned by the bulk read.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceValuesRow {
    pub user_id: DbId,
    pub device_id: String,
    pub io_values: serde_json::Value,
}

/// Body of `POST /devices/claim`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimDevice {
    pub device_id: String,
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    Claimed(DeviceStateSummary),
    /// The device exists but belongs to another tenant.
    ClaimedByOther,
    NotFound,
}

/// Outcome of an unclaim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnclaimResult {
    Released,
    NotOwner,
    NotFound,
}

/// Lightweight device view returned by claim operations.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct DeviceStateSummary {
    pub device_id: String,
    pub model: String,
    pub claimed_by_user_id: Option<DbId>,
    pub claimed_at: Option<Timestamp>,
}
