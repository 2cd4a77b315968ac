//! Device counter models and DTOs.
//!
//! A counter is bound to one digital input of one claimed device and
//! accumulates rising edges (`count`) and time spent high (`run_seconds`).

use coreflex_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `device_counters` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceCounter {
    pub id: DbId,
    pub user_id: DbId,
    /// `None` is the tenant's main dashboard.
    pub dashboard_id: Option<String>,
    pub widget_id: String,
    /// Empty until the widget is bound.
    pub device_id: String,
    pub field: String,
    pub count: i64,
    /// Edge-detection memory only; not exposed to clients.
    #[serde(skip_serializing)]
    pub prev_level: i16,
    pub run_seconds: i64,
    pub last_tick_at: Option<Timestamp>,
    pub enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The subset of an enabled counter the tick engine needs.
#[derive(Debug, Clone, FromRow)]
pub struct TickCounter {
    pub id: DbId,
    pub user_id: DbId,
    pub device_id: String,
    pub field: String,
    pub count: i64,
    pub prev_level: i16,
    pub run_seconds: i64,
    pub last_tick_at: Option<Timestamp>,
}

/// New accumulated state for one counter, written back by a tick pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterTickUpdate {
    pub id: DbId,
    pub count: i64,
    pub prev_level: i16,
    pub run_seconds: i64,
    pub last_tick_at: Timestamp,
}

// ---------------------------------------------------------------------------
// DTOs (request payloads)
// ---------------------------------------------------------------------------

/// Body of `POST /device-counters/create-placeholder`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePlaceholderCounter {
    #[validate(length(min = 1))]
    pub widget_id: String,
    pub dashboard_id: Option<String>,
}

/// Body of `POST /device-counters/upsert`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertCounter {
    #[validate(length(min = 1))]
    pub widget_id: String,
    #[validate(length(min = 1))]
    pub device_id: String,
    /// `di1..di6` or legacy `in1..in6`.
    #[validate(length(min = 1))]
    pub field: String,
    pub dashboard_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Body of `POST /device-counters/reset`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetCounter {
    #[validate(length(min = 1))]
    pub widget_id: String,
    pub dashboard_id: Option<String>,
}

/// Query string for counter listings and single-widget lookups.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CounterScopeQuery {
    pub dashboard_id: Option<String>,
}

/// Query string for `DELETE /device-counters`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteCounterQuery {
    pub widget_id: String,
    pub dashboard_id: Option<String>,
}
