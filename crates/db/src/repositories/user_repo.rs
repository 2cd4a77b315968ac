//! Repository for the `users` table.

use sqlx::PgPool;

use crate::models::user::{CreateUser, User};

const COLUMNS: &str = "id, email, name, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.email)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }
}
