//! PostgreSQL implementation for refresh token storage

use super::{column, json_column};
use crate::errors::StorageError;
use crate::oauth::types::RefreshToken;
use crate::storage::traits::{RefreshTokenStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of refresh token storage
pub struct PostgresRefreshTokenStore {
    pool: PgPool,
}

impl PostgresRefreshTokenStore {
    /// Create a new PostgreSQL refresh token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_refresh_token(row: &PgRow) -> Result<RefreshToken> {
        Ok(RefreshToken {
            value: column(row, "value")?,
            access_token_value: column(row, "access_token_value")?,
            sub: column(row, "sub")?,
            client_id: column(row, "client_id")?,
            scopes: json_column(row, "scopes")?,
            created_at: column(row, "created_at")?,
            expires_at: column(row, "expires_at")?,
        })
    }
}

#[async_trait]
impl RefreshTokenStore for PostgresRefreshTokenStore {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                value, access_token_value, sub, client_id, scopes, created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&token.value)
        .bind(&token.access_token_value)
        .bind(&token.sub)
        .bind(&token.client_id)
        .bind(Json(&token.scopes))
        .bind(token.created_at)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_refresh_token(&self, value: &str) -> Result<Option<RefreshToken>> {
        let row = sqlx::query("SELECT * FROM refresh_tokens WHERE value = $1")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_refresh_token).transpose()
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
