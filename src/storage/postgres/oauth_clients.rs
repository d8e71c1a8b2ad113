//! PostgreSQL implementation for OpenID client storage

use super::json_column;
use crate::errors::StorageError;
use crate::oauth::types::OpenIDClient;
use crate::storage::traits::{OpenIDClientStore, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;

/// PostgreSQL implementation of OpenID client storage
pub struct PostgresOpenIDClientStore {
    pool: PgPool,
}

impl PostgresOpenIDClientStore {
    /// Create a new PostgreSQL OpenID client store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_client(row: &PgRow) -> Result<OpenIDClient> {
        json_column(row, "client_data")
    }
}

#[async_trait]
impl OpenIDClientStore for PostgresOpenIDClientStore {
    async fn store_client(&self, client: &OpenIDClient) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO openid_clients (client_id, client_name, client_data)
            VALUES ($1, $2, $3)
            ON CONFLICT (client_id) DO UPDATE SET
                client_name = EXCLUDED.client_name,
                client_data = EXCLUDED.client_data
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.client_name)
        .bind(Json(client))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OpenIDClient>> {
        let row = sqlx::query("SELECT client_data FROM openid_clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OpenIDClient>> {
        // LIMIT NULL means no limit
        let rows = sqlx::query("SELECT client_data FROM openid_clients ORDER BY client_id LIMIT $1")
            .bind(limit.map(|limit| limit as i64))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_client).collect()
    }
}
