//! SQLite implementation for OpenID client storage

use super::{column, to_json};
use crate::errors::StorageError;
use crate::oauth::types::OpenIDClient;
use crate::storage::traits::{OpenIDClientStore, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of OpenID client storage
///
/// The client record is kept as a JSON document next to its id.
pub struct SqliteOpenIDClientStore {
    pool: SqlitePool,
}

impl SqliteOpenIDClientStore {
    /// Create a new SQLite OpenID client store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_client(row: &SqliteRow) -> Result<OpenIDClient> {
        let client_data: String = column(row, "client_data")?;
        serde_json::from_str(&client_data)
            .map_err(|e| StorageError::SerializationFailed(format!("Invalid client_data: {}", e)))
    }
}

#[async_trait]
impl OpenIDClientStore for SqliteOpenIDClientStore {
    async fn store_client(&self, client: &OpenIDClient) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO openid_clients (client_id, client_name, client_data)
            VALUES (?, ?, ?)
            ON CONFLICT(client_id) DO UPDATE SET
                client_name = excluded.client_name,
                client_data = excluded.client_data
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.client_name)
        .bind(to_json(client)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OpenIDClient>> {
        let row = sqlx::query("SELECT client_data FROM openid_clients WHERE client_id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OpenIDClient>> {
        let limit = limit.map(|limit| limit as i64).unwrap_or(-1);
        let rows = sqlx::query("SELECT client_data FROM openid_clients ORDER BY client_id LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_client).collect()
    }
}
