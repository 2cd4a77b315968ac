//! Control binding models: which output relay a control widget drives.

use coreflex_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `control_bindings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ControlBinding {
    pub id: DbId,
    pub user_id: DbId,
    pub dashboard_id: String,
    pub widget_id: String,
    pub widget_type: String,
    pub title: Option<String>,
    pub bind_device_id: String,
    pub bind_field: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Body of `POST /control-bindings/bind`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BindControl {
    #[validate(length(min = 1))]
    pub dashboard_id: String,
    #[validate(length(min = 1))]
    pub widget_id: String,
    #[validate(length(min = 1))]
    pub widget_type: String,
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub device_id: String,
    #[validate(length(min = 2))]
    pub field: String,
}

/// An output already taken on a dashboard, as listed by `GET /control-bindings/used`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsedOutput {
    pub field: String,
    pub widget_id: String,
    pub title: Option<String>,
    pub widget_type: String,
}

/// Query string for `GET /control-bindings/used`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsedOutputsQuery {
    pub dashboard_id: String,
    pub device_id: String,
}

/// Query string for `DELETE /control-bindings`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteBindingQuery {
    pub dashboard_id: String,
    pub widget_id: String,
}

/// Body of `POST /control/write`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WriteOutputRequest {
    #[validate(length(min = 1))]
    pub dashboard_id: String,
    #[validate(length(min = 1))]
    pub widget_id: String,
    pub value: bool,
}
