//! SQLite implementation for authorization code storage

use super::{column, format_timestamp, json_column, timestamp_column, to_json};
use crate::errors::StorageError;
use crate::oauth::types::AuthorizationCode;
use crate::storage::traits::{AuthorizationCodeStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of authorization code storage
pub struct SqliteAuthorizationCodeStore {
    pool: SqlitePool,
}

impl SqliteAuthorizationCodeStore {
    /// Create a new SQLite authorization code store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Convert SQLite row to AuthorizationCode
    fn row_to_authorization_code(row: &SqliteRow) -> Result<AuthorizationCode> {
        let used: i64 = column(row, "used")?;

        Ok(AuthorizationCode {
            code: column(row, "code")?,
            sub: column(row, "sub")?,
            client_id: column(row, "client_id")?,
            scopes: json_column(row, "scopes")?,
            redirect_uri: column(row, "redirect_uri")?,
            nonce: column(row, "nonce")?,
            id_token_claims: json_column(row, "id_token_claims")?,
            code_challenge: column(row, "code_challenge")?,
            code_challenge_method: column(row, "code_challenge_method")?,
            created_at: timestamp_column(row, "created_at")?,
            expires_at: timestamp_column(row, "expires_at")?,
            used: used != 0,
        })
    }
}

#[async_trait]
impl AuthorizationCodeStore for SqliteAuthorizationCodeStore {
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()> {
        let used_int = if code.used { 1i64 } else { 0i64 };

        sqlx::query(
            r#"
            INSERT INTO authorization_codes (
                code, sub, client_id, scopes, redirect_uri, nonce, id_token_claims,
                code_challenge, code_challenge_method, created_at, expires_at, used
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&code.code)
        .bind(&code.sub)
        .bind(&code.client_id)
        .bind(to_json(&code.scopes)?)
        .bind(&code.redirect_uri)
        .bind(&code.nonce)
        .bind(to_json(&code.id_token_claims)?)
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(format_timestamp(&code.created_at))
        .bind(format_timestamp(&code.expires_at))
        .bind(used_int)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        let row = sqlx::query("SELECT * FROM authorization_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_authorization_code).transpose()
    }

    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM authorization_codes WHERE expires_at < ?")
            .bind(format_timestamp(&now))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
