//! Repository for the `device_counters` table.
//!
//! Tenant-scoped CRUD for the counter endpoints, plus the two raw
//! operations the tick engine needs: list every enabled counter and write
//! back a batch of changed rows in one statement.

use coreflex_core::counter::{
    is_rebinding, DashboardScope, DigitalInput, Level, DEFAULT_COUNTER_FIELD,
};
use coreflex_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::counter::{CounterTickUpdate, DeviceCounter, TickCounter};

/// Column list for `device_counters` queries.
const COLUMNS: &str = "\
    id, user_id, dashboard_id, widget_id, device_id, field, count, \
    prev_level, run_seconds, last_tick_at, enabled, created_at, updated_at";

/// Scope predicate shared by widget lookups. `$3` is "any dashboard",
/// `$4` the pinned dashboard id (`NULL` for main).
const SCOPE_PREDICATE: &str = "($3 OR dashboard_id IS NOT DISTINCT FROM $4::TEXT)";

/// Resolved arguments for [`CounterRepo::upsert_binding`].
#[derive(Debug, Clone)]
pub struct CounterBindingInput<'a> {
    pub user_id: DbId,
    pub scope: &'a DashboardScope,
    pub widget_id: &'a str,
    pub device_id: &'a str,
    pub field: DigitalInput,
    pub enabled: bool,
    /// Level observed right now; seeds `prev_level` so binding mid-signal
    /// does not produce a phantom edge.
    pub current_level: Level,
}

/// Provides data access for device counters.
pub struct CounterRepo;

impl CounterRepo {
    // -----------------------------------------------------------------------
    // Tenant-facing operations
    // -----------------------------------------------------------------------

    /// Create a disabled placeholder for a freshly placed widget.
    ///
    /// Idempotent: if the (tenant, dashboard, widget) row already exists it
    /// is returned unchanged. The second tuple element is `true` when a row
    /// was inserted.
    pub async fn create_placeholder(
        pool: &PgPool,
        user_id: DbId,
        dashboard_id: Option<&str>,
        widget_id: &str,
    ) -> Result<(DeviceCounter, bool), sqlx::Error> {
        let query = format!(
            "INSERT INTO device_counters \
                 (user_id, dashboard_id, widget_id, device_id, field, enabled) \
             VALUES ($1, $2, $3, '', $4, FALSE) \
             ON CONFLICT (user_id, (COALESCE(dashboard_id, '')), widget_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, DeviceCounter>(&query)
            .bind(user_id)
            .bind(dashboard_id)
            .bind(widget_id)
            .bind(DEFAULT_COUNTER_FIELD.as_str())
            .fetch_optional(pool)
            .await?;

        if let Some(row) = inserted {
            return Ok((row, true));
        }

        let scope = match dashboard_id {
            Some(id) => DashboardScope::Named(id.to_string()),
            None => DashboardScope::Main,
        };
        let existing = Self::find_by_widget(pool, user_id, &scope, widget_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((existing, false))
    }

    /// Find a tenant's counter for a widget within `scope`.
    ///
    /// With [`DashboardScope::Any`] the oldest matching row wins.
    pub async fn find_by_widget<'e, E>(
        executor: E,
        user_id: DbId,
        scope: &DashboardScope,
        widget_id: &str,
    ) -> Result<Option<DeviceCounter>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM device_counters \
             WHERE user_id = $1 AND widget_id = $2 AND {SCOPE_PREDICATE} \
             ORDER BY created_at ASC, id ASC \
             LIMIT 1"
        );
        sqlx::query_as::<_, DeviceCounter>(&query)
            .bind(user_id)
            .bind(widget_id)
            .bind(scope.is_any())
            .bind(scope.dashboard_id())
            .fetch_optional(executor)
            .await
    }

    /// List a tenant's counters within `scope`, oldest first.
    pub async fn list(
        pool: &PgPool,
        user_id: DbId,
        scope: &DashboardScope,
    ) -> Result<Vec<DeviceCounter>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM device_counters \
             WHERE user_id = $1 AND ($2 OR dashboard_id IS NOT DISTINCT FROM $3::TEXT) \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, DeviceCounter>(&query)
            .bind(user_id)
            .bind(scope.is_any())
            .bind(scope.dashboard_id())
            .fetch_all(pool)
            .await
    }

    /// Bind a counter to a device input, creating the row if needed.
    ///
    /// If the device or field differs from the current binding, `count` and
    /// `run_seconds` are reset to zero. In every case `prev_level` is
    /// re-seeded from `current_level` and the timer restarts at `NOW()`.
    pub async fn upsert_binding(
        pool: &PgPool,
        input: &CounterBindingInput<'_>,
    ) -> Result<DeviceCounter, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing =
            Self::find_by_widget(&mut *tx, input.user_id, input.scope, input.widget_id).await?;

        let row = match existing {
            Some(current) => {
                let reset = is_rebinding(
                    &current.device_id,
                    &current.field,
                    input.device_id,
                    input.field,
                );
                let query = format!(
                    "UPDATE device_counters SET \
                         device_id    = $2, \
                         field        = $3, \
                         enabled      = $4, \
                         prev_level   = $5, \
                         count        = CASE WHEN $6 THEN 0 ELSE count END, \
                         run_seconds  = CASE WHEN $6 THEN 0 ELSE run_seconds END, \
                         last_tick_at = NOW() \
                     WHERE id = $1 \
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, DeviceCounter>(&query)
                    .bind(current.id)
                    .bind(input.device_id)
                    .bind(input.field.as_str())
                    .bind(input.enabled)
                    .bind(input.current_level.as_i16())
                    .bind(reset)
                    .fetch_one(&mut *tx)
                    .await?
            }
            None => {
                let query = format!(
                    "INSERT INTO device_counters \
                         (user_id, dashboard_id, widget_id, device_id, field, \
                          count, prev_level, run_seconds, last_tick_at, enabled) \
                     VALUES ($1, $2, $3, $4, $5, 0, $6, 0, NOW(), $7) \
                     RETURNING {COLUMNS}"
                );
                sqlx::query_as::<_, DeviceCounter>(&query)
                    .bind(input.user_id)
                    .bind(input.scope.dashboard_id())
                    .bind(input.widget_id)
                    .bind(input.device_id)
                    .bind(input.field.as_str())
                    .bind(input.current_level.as_i16())
                    .bind(input.enabled)
                    .fetch_one(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;
        Ok(row)
    }

    /// Zero `count` and `run_seconds`, re-seed `prev_level` and restart the
    /// timer.
    pub async fn reset(
        pool: &PgPool,
        id: DbId,
        current_level: Level,
    ) -> Result<Option<DeviceCounter>, sqlx::Error> {
        let query = format!(
            "UPDATE device_counters SET \
                 count = 0, \
                 run_seconds = 0, \
                 prev_level = $2, \
                 last_tick_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DeviceCounter>(&query)
            .bind(id)
            .bind(current_level.as_i16())
            .fetch_optional(pool)
            .await
    }

    /// Delete a tenant's counter(s) for a widget within `scope`.
    ///
    /// Returns the ids of deleted rows (empty when nothing matched).
    pub async fn delete_by_widget(
        pool: &PgPool,
        user_id: DbId,
        scope: &DashboardScope,
        widget_id: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let query = format!(
            "DELETE FROM device_counters \
             WHERE user_id = $1 AND widget_id = $2 AND {SCOPE_PREDICATE} \
             RETURNING id"
        );
        sqlx::query_scalar::<_, DbId>(&query)
            .bind(user_id)
            .bind(widget_id)
            .bind(scope.is_any())
            .bind(scope.dashboard_id())
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Tick engine operations
    // -----------------------------------------------------------------------

    /// Load every enabled counter, oldest-updated first.
    pub async fn list_enabled_for_tick<'e, E>(executor: E) -> Result<Vec<TickCounter>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TickCounter>(
            "SELECT id, user_id, device_id, field, count, prev_level, run_seconds, last_tick_at \
             FROM device_counters \
             WHERE enabled = TRUE \
             ORDER BY updated_at ASC, id ASC",
        )
        .fetch_all(executor)
        .await
    }

    /// Write back a batch of tick results in a single statement.
    ///
    /// Rows disabled since they were loaded are left untouched, and a stored
    /// `last_tick_at` is never moved backwards. Returns the number of rows
    /// updated.
    pub async fn apply_tick_updates<'e, E>(
        executor: E,
        updates: &[CounterTickUpdate],
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if updates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<DbId> = updates.iter().map(|u| u.id).collect();
        let counts: Vec<i64> = updates.iter().map(|u| u.count).collect();
        let levels: Vec<i16> = updates.iter().map(|u| u.prev_level).collect();
        let run_seconds: Vec<i64> = updates.iter().map(|u| u.run_seconds).collect();
        let ticked_at: Vec<_> = updates.iter().map(|u| u.last_tick_at).collect();

        let result = sqlx::query(
            "UPDATE device_counters AS c SET \
                 count        = u.count, \
                 prev_level   = u.prev_level, \
                 run_seconds  = u.run_seconds, \
                 last_tick_at = GREATEST(c.last_tick_at, u.last_tick_at) \
             FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::SMALLINT[], $4::BIGINT[], $5::TIMESTAMPTZ[]) \
                 AS u(id, count, prev_level, run_seconds, last_tick_at) \
             WHERE c.id = u.id AND c.enabled = TRUE",
        )
        .bind(&ids)
        .bind(&counts)
        .bind(&levels)
        .bind(&run_seconds)
        .bind(&ticked_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}
