//! PostgreSQL implementation for authorization code storage

use super::{column, json_column};
use crate::errors::StorageError;
use crate::oauth::types::AuthorizationCode;
use crate::storage::traits::{AuthorizationCodeStore, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of authorization code storage
pub struct PostgresAuthorizationCodeStore {
    pool: PgPool,
}

impl PostgresAuthorizationCodeStore {
    /// Create a new PostgreSQL authorization code store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convert PostgreSQL row to AuthorizationCode
    fn row_to_authorization_code(row: &PgRow) -> Result<AuthorizationCode> {
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
            created_at: column(row, "created_at")?,
            expires_at: column(row, "expires_at")?,
            used: column(row, "used")?,
        })
    }
}

#[async_trait]
impl AuthorizationCodeStore for PostgresAuthorizationCodeStore {
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO authorization_codes (
                code, sub, client_id, scopes, redirect_uri, nonce, id_token_claims,
                code_challenge, code_challenge_method, created_at, expires_at, used
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&code.code)
        .bind(&code.sub)
        .bind(&code.client_id)
        .bind(Json(&code.scopes))
        .bind(&code.redirect_uri)
        .bind(&code.nonce)
        .bind(Json(&code.id_token_claims))
        .bind(&code.code_challenge)
        .bind(&code.code_challenge_method)
        .bind(code.created_at)
        .bind(code.expires_at)
        .bind(code.used)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        let row = sqlx::query("SELECT * FROM authorization_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_authorization_code).transpose()
    }

    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> Result<usize> {
        let result = sqlx::query("DELETE FROM authorization_codes WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
