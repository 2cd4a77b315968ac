//! Lock-guarded output writes.
//!
//! A write resolves the widget's binding, re-checks the device claim, takes
//! the `(device, output)` actuation lock, hands the command to the gateway
//! and always releases the lock afterwards. The database connection used
//! for the lookups and the lock insert is returned to the pool before the
//! gateway is contacted.

use std::time::Duration;

use coreflex_core::actuation::{LockKey, OutputField};
use coreflex_core::error::CoreError;
use coreflex_core::types::DbId;
use coreflex_db::repositories::{ActuationLockRepo, ControlBindingRepo, DeviceStateRepo};
use coreflex_gateway::{GatewayClient, WriteCommand, WriteOutcome};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// Successful results of [`ActuationManager::write_output`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult {
    /// The gateway acknowledged the write.
    Acknowledged(Value),
    /// The gateway timed out or was unreachable; poll device state to
    /// confirm.
    Pending,
}

/// Why a write did not go through.
#[derive(Debug, thiserror::Error)]
pub enum ActuationError {
    #[error("No control binding for widget {widget_id}")]
    BindingNotFound { widget_id: String },

    #[error("Device {device_id} is not claimed by this account")]
    DeviceNotClaimed { device_id: String },

    #[error("Stored binding has invalid output field '{0}'")]
    InvalidBinding(String),

    #[error("Another write to {0} is in progress")]
    InProgress(String),

    #[error("Gateway rejected write ({status}): {body}")]
    GatewayRejected { status: u16, body: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Write task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl From<ActuationError> for AppError {
    fn from(err: ActuationError) -> Self {
        match err {
            ActuationError::BindingNotFound { widget_id } => {
                AppError::Core(CoreError::not_found("ControlBinding", widget_id))
            }
            err @ ActuationError::DeviceNotClaimed { .. } => {
                AppError::Core(CoreError::Forbidden(err.to_string()))
            }
            err @ ActuationError::InvalidBinding(_) => AppError::InternalError(err.to_string()),
            err @ ActuationError::InProgress(_) => AppError::ControlInProgress(err.to_string()),
            ActuationError::GatewayRejected { body, .. } => AppError::GatewayFailed(body),
            ActuationError::Database(e) => AppError::Database(e),
            err @ ActuationError::TaskFailed(_) => AppError::InternalError(err.to_string()),
        }
    }
}

/// Performs output writes for widgets.
pub struct ActuationManager {
    pool: PgPool,
    gateway: GatewayClient,
    lock_ttl: Duration,
}

impl ActuationManager {
    pub fn new(pool: PgPool, gateway: GatewayClient, lock_ttl: Duration) -> Self {
        Self {
            pool,
            gateway,
            lock_ttl,
        }
    }

    /// Drive the output bound to `widget_id` on `dashboard_id` to `value`.
    pub async fn write_output(
        &self,
        user_id: DbId,
        dashboard_id: &str,
        widget_id: &str,
        value: bool,
    ) -> Result<WriteResult, ActuationError> {
        let mut conn = self.pool.acquire().await?;

        let binding =
            ControlBindingRepo::find_for_widget(&mut *conn, user_id, dashboard_id, widget_id)
                .await?
                .ok_or_else(|| ActuationError::BindingNotFound {
                    widget_id: widget_id.to_string(),
                })?;
        let field = OutputField::parse(&binding.bind_field)
            .ok_or_else(|| ActuationError::InvalidBinding(binding.bind_field.clone()))?;

        if !DeviceStateRepo::is_claimed_by(&mut *conn, user_id, &binding.bind_device_id).await? {
            return Err(ActuationError::DeviceNotClaimed {
                device_id: binding.bind_device_id,
            });
        }

        if let Err(e) = ActuationLockRepo::sweep_expired(&mut *conn).await {
            tracing::warn!(error = %e, "Actuation lock sweep failed");
        }

        let key = LockKey::new(&binding.bind_device_id, field);
        let token = Uuid::new_v4();
        let acquired =
            ActuationLockRepo::try_acquire(&mut *conn, &key, user_id, token, self.lock_ttl).await?;

        // No connection is held across the gateway call.
        drop(conn);

        if acquired.is_none() {
            tracing::info!(lock_key = %key, user_id, "Actuation lock busy");
            return Err(ActuationError::InProgress(key.to_string()));
        }

        let command = WriteCommand {
            device_id: key.device_id().to_string(),
            output_index: field.index(),
            value,
            correlation_id: token,
            tenant_id: user_id,
        };

        // Detached so the lock is released even if the request is dropped
        // mid-call.
        let pool = self.pool.clone();
        let gateway = self.gateway.clone();
        let task = tokio::spawn(async move {
            let outcome = gateway.write_output(&command).await;
            release_lock(&pool, &key, token).await;
            outcome
        });

        let outcome = task.await?;

        match outcome {
            WriteOutcome::Acknowledged(ack) => {
                tracing::info!(
                    correlation_id = %token,
                    user_id,
                    value,
                    "Output write acknowledged",
                );
                Ok(WriteResult::Acknowledged(ack))
            }
            WriteOutcome::Pending => Ok(WriteResult::Pending),
            WriteOutcome::Rejected { status, body } => {
                tracing::warn!(
                    correlation_id = %token,
                    status,
                    body = %body,
                    "Gateway rejected output write",
                );
                Err(ActuationError::GatewayRejected { status, body })
            }
        }
    }
}

/// Best-effort release on a fresh pooled connection. The TTL sweep is the
/// backstop when this fails.
async fn release_lock(pool: &PgPool, key: &LockKey, token: Uuid) {
    match ActuationLockRepo::release(pool, key, token).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(lock_key = %key, "Actuation lock already gone at release"),
        Err(e) => tracing::warn!(lock_key = %key, error = %e, "Actuation lock release failed"),
    }
}
