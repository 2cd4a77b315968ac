//! Repository for the `device_states` table.
//!
//! Device ownership is decided here: every read that feeds a counter or an
//! output write is filtered by `claimed_by_user_id`, so a tenant can never
//! observe or drive another tenant's hardware.

use coreflex_core::counter::{DigitalInput, Level};
use coreflex_core::telemetry::DeviceModel;
use coreflex_core::types::DbId;
use serde_json::{Map, Value};
use sqlx::{PgExecutor, PgPool};

use crate::models::device::{
    ClaimResult, DeviceState, DeviceStateSummary, DeviceValuesRow, UnclaimResult,
};

/// Column list for `device_states` queries.
const COLUMNS: &str = "\
    id, device_id, model, claimed_by_user_id, claimed_at, status, last_seen, \
    io_values, created_at, updated_at";

const SUMMARY_COLUMNS: &str = "device_id, model, claimed_by_user_id, claimed_at";

/// Provides data access for device state.
pub struct DeviceStateRepo;

impl DeviceStateRepo {
    pub async fn find_by_device_id(
        pool: &PgPool,
        device_id: &str,
    ) -> Result<Option<DeviceState>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM device_states WHERE device_id = $1");
        sqlx::query_as::<_, DeviceState>(&query)
            .bind(device_id.trim())
            .fetch_optional(pool)
            .await
    }

    /// List the devices a tenant has claimed, ordered by device id.
    pub async fn list_claimed(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<DeviceState>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_states \
             WHERE claimed_by_user_id = $1 \
             ORDER BY device_id ASC"
        );
        sqlx::query_as::<_, DeviceState>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Whether `device_id` is currently claimed by `user_id`.
    pub async fn is_claimed_by<'e, E>(
        executor: E,
        user_id: DbId,
        device_id: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (\
                 SELECT 1 FROM device_states \
                 WHERE device_id = $1 AND claimed_by_user_id = $2\
             )",
        )
        .bind(device_id.trim())
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Claim an unowned device. Re-claiming one's own device is a no-op
    /// success.
    pub async fn claim(
        pool: &PgPool,
        user_id: DbId,
        device_id: &str,
    ) -> Result<ClaimResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let owner: Option<Option<DbId>> = sqlx::query_scalar(
            "SELECT claimed_by_user_id FROM device_states WHERE device_id = $1 FOR UPDATE",
        )
        .bind(device_id.trim())
        .fetch_optional(&mut *tx)
        .await?;

        let result = match owner {
            None => ClaimResult::NotFound,
            Some(Some(holder)) if holder != user_id => ClaimResult::ClaimedByOther,
            Some(_) => {
                let query = format!(
                    "UPDATE device_states SET \
                         claimed_by_user_id = $2, \
                         claimed_at = COALESCE(claimed_at, NOW()) \
                     WHERE device_id = $1 \
                     RETURNING {SUMMARY_COLUMNS}"
                );
                let summary = sqlx::query_as::<_, DeviceStateSummary>(&query)
                    .bind(device_id.trim())
                    .bind(user_id)
                    .fetch_one(&mut *tx)
                    .await?;
                ClaimResult::Claimed(summary)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Release a device the tenant owns.
    pub async fn unclaim(
        pool: &PgPool,
        user_id: DbId,
        device_id: &str,
    ) -> Result<UnclaimResult, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let owner: Option<Option<DbId>> = sqlx::query_scalar(
            "SELECT claimed_by_user_id FROM device_states WHERE device_id = $1 FOR UPDATE",
        )
        .bind(device_id.trim())
        .fetch_optional(&mut *tx)
        .await?;

        let result = match owner {
            None => UnclaimResult::NotFound,
            Some(holder) if holder != Some(user_id) => UnclaimResult::NotOwner,
            Some(_) => {
                sqlx::query(
                    "UPDATE device_states SET claimed_by_user_id = NULL, claimed_at = NULL \
                     WHERE device_id = $1",
                )
                .bind(device_id.trim())
                .execute(&mut *tx)
                .await?;
                UnclaimResult::Released
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Merge sanitized telemetry into a device's stored values, registering
    /// the device if it has never reported before.
    pub async fn record_telemetry(
        pool: &PgPool,
        device_id: &str,
        model: DeviceModel,
        values: &Map<String, Value>,
    ) -> Result<DeviceState, sqlx::Error> {
        let query = format!(
            "INSERT INTO device_states (device_id, model, status, last_seen, io_values) \
             VALUES ($1, $2, 'online', NOW(), $3) \
             ON CONFLICT (device_id) DO UPDATE SET \
                 model     = EXCLUDED.model, \
                 status    = 'online', \
                 last_seen = NOW(), \
                 io_values = device_states.io_values || EXCLUDED.io_values \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceState>(&query)
            .bind(device_id.trim())
            .bind(model.as_str())
            .bind(Value::Object(values.clone()))
            .fetch_one(pool)
            .await
    }

    /// Bulk-read current values for a set of (tenant, device) pairs in one
    /// round trip.
    ///
    /// Only devices claimed by the paired tenant come back; a pair whose
    /// device is missing or owned by someone else is silently absent.
    pub async fn bulk_read_inputs<'e, E>(
        executor: E,
        pairs: &[(DbId, String)],
    ) -> Result<Vec<DeviceValuesRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids: Vec<DbId> = pairs.iter().map(|(u, _)| *u).collect();
        let device_ids: Vec<String> = pairs.iter().map(|(_, d)| d.trim().to_string()).collect();

        sqlx::query_as::<_, DeviceValuesRow>(
            "SELECT DISTINCT p.user_id, s.device_id, s.io_values \
             FROM UNNEST($1::BIGINT[], $2::TEXT[]) AS p(user_id, device_id) \
             JOIN device_states s \
               ON s.device_id = p.device_id AND s.claimed_by_user_id = p.user_id",
        )
        .bind(&user_ids)
        .bind(&device_ids)
        .fetch_all(executor)
        .await
    }

    /// Current level of one input on a tenant's device.
    ///
    /// Returns `Level::Low` when the device is not claimed by the tenant or
    /// has never reported the field.
    pub async fn read_level<'e, E>(
        executor: E,
        user_id: DbId,
        device_id: &str,
        field: DigitalInput,
    ) -> Result<Level, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let value: Option<Option<Value>> = sqlx::query_scalar(
            "SELECT io_values -> $3 FROM device_states \
             WHERE device_id = $1 AND claimed_by_user_id = $2",
        )
        .bind(device_id.trim())
        .bind(user_id)
        .bind(field.as_str())
        .fetch_optional(executor)
        .await?;

        Ok(value
            .flatten()
            .as_ref()
            .and_then(Level::from_json)
            .unwrap_or(Level::Low))
    }
}
