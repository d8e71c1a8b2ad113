//! PostgreSQL implementation for access token storage

use super::{column, json_column};
use crate::errors::StorageError;
use crate::oauth::types::AccessToken;
use crate::storage::traits::{AccessTokenStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of access token storage
pub struct PostgresAccessTokenStore {
    pool: PgPool,
}

impl PostgresAccessTokenStore {
    /// Create a new PostgreSQL access token store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to AccessToken
    fn row_to_access_token(row: &PgRow) -> Result<AccessToken> {
        Ok(AccessToken {
            value: column(row, "value")?,
            signing_key_id: column(row, "signing_key_id")?,
            sub: column(row, "sub")?,
            client_id: column(row, "client_id")?,
            scopes: json_column(row, "scopes")?,
            created_at: column(row, "created_at")?,
            expires_at: column(row, "expires_at")?,
            client_credentials: column(row, "client_credentials")?,
        })
    }
}

#[async_trait]
impl AccessTokenStore for PostgresAccessTokenStore {
    async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO access_tokens (
                value, signing_key_id, sub, client_id, scopes, created_at, expires_at,
                client_credentials
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&token.value)
        .bind(&token.signing_key_id)
        .bind(&token.sub)
        .bind(&token.client_id)
        .bind(Json(&token.scopes))
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.client_credentials)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE value = $1")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_access_token).transpose()
    }

    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
