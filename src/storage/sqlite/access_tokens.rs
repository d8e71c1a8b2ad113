//! SQLite implementation for access token storage

use super::{column, format_timestamp, json_column, timestamp_column, to_json};
use crate::errors::StorageError;
use crate::oauth::types::AccessToken;
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of access token storage
pub struct SqliteAccessTokenStore {
    pool: SqlitePool,
}

impl SqliteAccessTokenStore {
    /// Create a new SQLite access token store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_access_token(row: &SqliteRow) -> Result<AccessToken> {
        let client_credentials: i64 = column(row, "client_credentials")?;

        Ok(AccessToken {
            value: column(row, "value")?,
            signing_key_id: column(row, "signing_key_id")?,
            sub: column(row, "sub")?,
            client_id: column(row, "client_id")?,
            scopes: json_column(row, "scopes")?,
            created_at: timestamp_column(row, "created_at")?,
            expires_at: timestamp_column(row, "expires_at")?,
            client_credentials: client_credentials != 0,
        })
    }
}

#[async_trait]
impl AccessTokenStore for SqliteAccessTokenStore {
    async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (
                value, signing_key_id, sub, client_id, scopes, created_at, expires_at,
                client_credentials
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token.value)
        .bind(&token.signing_key_id)
        .bind(&token.sub)
        .bind(&token.client_id)
        .bind(to_json(&token.scopes)?)
        .bind(format_timestamp(&token.created_at))
        .bind(format_timestamp(&token.expires_at))
        .bind(if token.client_credentials { 1i64 } else { 0i64 })
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE value = ?")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }

    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at < ?")
            .bind(format_timestamp(&now))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
