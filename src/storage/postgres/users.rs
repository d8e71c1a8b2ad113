//! PostgreSQL implementation for user storage

use super::{column, json_column};
use crate::errors::StorageError;
use crate::oauth::types::User;
use crate::storage::traits::{Result, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of user storage
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Create a new PostgreSQL user store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<User> {
        Ok(User {
            sub: column(row, "sub")?,
            client_id: column(row, "client_id")?,
            attributes: json_column(row, "attributes")?,
            acr_claims: json_column(row, "acr_claims")?,
            created_at: column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn store_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (sub, client_id, attributes, acr_claims, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (sub) DO UPDATE SET
                client_id = EXCLUDED.client_id,
                attributes = EXCLUDED.attributes,
                acr_claims = EXCLUDED.acr_claims,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&user.sub)
        .bind(&user.client_id)
        .bind(Json(&user.attributes))
        .bind(Json(&user.acr_claims))
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_user(&self, sub: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE sub = $1")
            .bind(sub)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn delete_user(&self, sub: &str) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE sub = $1")
            .bind(sub)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn delete_users_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM users WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
