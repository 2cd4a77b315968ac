//! Repository for the `control_bindings` table.

use coreflex_core::actuation::{ControlWidgetType, OutputField};
use coreflex_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::is_unique_violation;
use crate::models::control_binding::{ControlBinding, UsedOutput};

/// Column list for `control_bindings` queries.
const COLUMNS: &str = "\
    id, user_id, dashboard_id, widget_id, widget_type, title, bind_device_id, \
    bind_field, created_at, updated_at";

const OUTPUT_CONSTRAINT: &str = "uq_control_bindings_output";

/// Resolved arguments for [`ControlBindingRepo::bind`].
#[derive(Debug, Clone)]
pub struct ControlBindingInput<'a> {
    pub user_id: DbId,
    pub dashboard_id: &'a str,
    pub widget_id: &'a str,
    pub widget_type: ControlWidgetType,
    pub title: Option<&'a str>,
    pub device_id: &'a str,
    pub field: OutputField,
}

/// Outcome of [`ControlBindingRepo::bind`].
#[derive(Debug, Clone)]
pub enum BindOutcome {
    Bound(ControlBinding),
    /// Another widget on the same dashboard already drives this output.
    OutputInUse { widget_id: String },
}

/// Provides data access for control bindings.
pub struct ControlBindingRepo;

impl ControlBindingRepo {
    /// Bind a widget to an output, replacing any previous binding of the
    /// same widget.
    pub async fn bind(
        pool: &PgPool,
        input: &ControlBindingInput<'_>,
    ) -> Result<BindOutcome, sqlx::Error> {
        if let Some(holder) = Self::find_output_holder(pool, input).await? {
            return Ok(BindOutcome::OutputInUse { widget_id: holder });
        }

        let query = format!(
            "INSERT INTO control_bindings \
                 (user_id, dashboard_id, widget_id, widget_type, title, bind_device_id, bind_field) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT ON CONSTRAINT uq_control_bindings_widget DO UPDATE SET \
                 widget_type    = EXCLUDED.widget_type, \
                 title          = EXCLUDED.title, \
                 bind_device_id = EXCLUDED.bind_device_id, \
                 bind_field     = EXCLUDED.bind_field \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, ControlBinding>(&query)
            .bind(input.user_id)
            .bind(input.dashboard_id)
            .bind(input.widget_id)
            .bind(input.widget_type.as_str())
            .bind(input.title)
            .bind(input.device_id)
            .bind(input.field.as_str())
            .fetch_one(pool)
            .await;

        match inserted {
            Ok(row) => Ok(BindOutcome::Bound(row)),
            // Lost a race with a concurrent bind of the same output.
            Err(err) if is_unique_violation(&err, OUTPUT_CONSTRAINT) => {
                let holder = Self::find_output_holder(pool, input)
                    .await?
                    .unwrap_or_default();
                Ok(BindOutcome::OutputInUse { widget_id: holder })
            }
            Err(err) => Err(err),
        }
    }

    /// Widget id of another widget on the dashboard already bound to the
    /// same output, if any.
    async fn find_output_holder(
        pool: &PgPool,
        input: &ControlBindingInput<'_>,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT widget_id FROM control_bindings \
             WHERE user_id = $1 AND dashboard_id = $2 \
               AND bind_device_id = $3 AND bind_field = $4 \
               AND widget_id <> $5 \
             LIMIT 1",
        )
        .bind(input.user_id)
        .bind(input.dashboard_id)
        .bind(input.device_id)
        .bind(input.field.as_str())
        .bind(input.widget_id)
        .fetch_optional(pool)
        .await
    }

    /// Outputs of `device_id` already bound on a dashboard.
    pub async fn list_used(
        pool: &PgPool,
        user_id: DbId,
        dashboard_id: &str,
        device_id: &str,
    ) -> Result<Vec<UsedOutput>, sqlx::Error> {
        sqlx::query_as::<_, UsedOutput>(
            "SELECT bind_field AS field, widget_id, title, widget_type \
             FROM control_bindings \
             WHERE user_id = $1 AND dashboard_id = $2 AND bind_device_id = $3 \
             ORDER BY bind_field ASC",
        )
        .bind(user_id)
        .bind(dashboard_id)
        .bind(device_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_for_widget<'e, E>(
        executor: E,
        user_id: DbId,
        dashboard_id: &str,
        widget_id: &str,
    ) -> Result<Option<ControlBinding>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM control_bindings \
             WHERE user_id = $1 AND dashboard_id = $2 AND widget_id = $3"
        );
        sqlx::query_as::<_, ControlBinding>(&query)
            .bind(user_id)
            .bind(dashboard_id)
            .bind(widget_id)
            .fetch_optional(executor)
            .await
    }

    /// Delete a widget's binding. Returns `true` if a row was deleted.
    pub async fn delete(
        pool: &PgPool,
        user_id: DbId,
        dashboard_id: &str,
        widget_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM control_bindings \
             WHERE user_id = $1 AND dashboard_id = $2 AND widget_id = $3",
        )
        .bind(user_id)
        .bind(dashboard_id)
        .bind(widget_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
