//! SQLite implementation for user storage

use super::{column, format_timestamp, json_column, timestamp_column, to_json};
use crate::errors::StorageError;
use crate::oauth::types::User;
use crate::storage::traits::{Result, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of user storage
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Create a new SQLite user store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        Ok(User {
            sub: column(row, "sub")?,
            client_id: column(row, "client_id")?,
            attributes: json_column(row, "attributes")?,
            acr_claims: json_column(row, "acr_claims")?,
            created_at: timestamp_column(row, "created_at")?,
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn store_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO users (sub, client_id, attributes, acr_claims, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.sub)
        .bind(&user.client_id)
        .bind(to_json(&user.attributes)?)
        .bind(to_json(&user.acr_claims)?)
        .bind(format_timestamp(&user.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_user(&self, sub: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE sub = ?")
            .bind(sub)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn delete_user(&self, sub: &str) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE sub = ?")
            .bind(sub)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn delete_users_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM users WHERE created_at < ?")
            .bind(format_timestamp(&cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
