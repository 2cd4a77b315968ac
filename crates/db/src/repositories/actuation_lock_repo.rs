//! Repository for the `actuation_locks` table.
//!
//! The primary key on `lock_key` is the only serialization point. Acquire
//! is a single `INSERT .. ON CONFLICT` statement that either creates the
//! row or takes over one whose `expires_at` has passed, so two concurrent
//! callers can never both succeed.

use std::time::Duration;

use coreflex_core::actuation::LockKey;
use coreflex_core::types::DbId;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::actuation_lock::ActuationLock;

/// Column list for `actuation_locks` queries.
const COLUMNS: &str =
    "lock_key, device_id, output_field, user_id, lock_token, created_at, expires_at";

/// Provides data access for actuation locks.
pub struct ActuationLockRepo;

impl ActuationLockRepo {
    /// Delete every lock whose `expires_at` has passed.
    pub async fn sweep_expired<'e, E>(executor: E) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM actuation_locks WHERE expires_at <= NOW()")
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Try to take the lock for `key`.
    ///
    /// Returns the new row on success and `None` when a live lock is held
    /// by someone else. An expired row is replaced in place.
    pub async fn try_acquire<'e, E>(
        executor: E,
        key: &LockKey,
        user_id: DbId,
        token: Uuid,
        ttl: Duration,
    ) -> Result<Option<ActuationLock>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO actuation_locks \
                 (lock_key, device_id, output_field, user_id, lock_token, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW() + make_interval(secs => $6::DOUBLE PRECISION)) \
             ON CONFLICT (lock_key) DO UPDATE SET \
                 device_id    = EXCLUDED.device_id, \
                 output_field = EXCLUDED.output_field, \
                 user_id      = EXCLUDED.user_id, \
                 lock_token   = EXCLUDED.lock_token, \
                 created_at   = EXCLUDED.created_at, \
                 expires_at   = EXCLUDED.expires_at \
             WHERE actuation_locks.expires_at <= NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActuationLock>(&query)
            .bind(key.to_string())
            .bind(key.device_id())
            .bind(key.field().as_str())
            .bind(user_id)
            .bind(token)
            .bind(ttl.as_secs_f64())
            .fetch_optional(executor)
            .await
    }

    /// Release the lock for `key`, but only if it still carries `token`.
    ///
    /// Returns `false` when the row is gone or was taken over after expiry.
    pub async fn release<'e, E>(
        executor: E,
        key: &LockKey,
        token: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result =
            sqlx::query("DELETE FROM actuation_locks WHERE lock_key = $1 AND lock_token = $2")
                .bind(key.to_string())
                .bind(token)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find(pool: &PgPool, key: &LockKey) -> Result<Option<ActuationLock>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM actuation_locks WHERE lock_key = $1");
        sqlx::query_as::<_, ActuationLock>(&query)
            .bind(key.to_string())
            .fetch_optional(pool)
            .await
    }
}
