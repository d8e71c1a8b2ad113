//! SQLite implementation for signing keys, symmetric keys and the key sequence

use super::{column, format_timestamp, timestamp_column};
use crate::errors::StorageError;
use crate::storage::traits::{
    KeySequenceStore, Result, SigningKey, SigningKeyStore, SymmetricKey, SymmetricKeyStore,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};

/// SQLite implementation of key material storage
pub struct SqliteKeyStore {
    pool: SqlitePool,
}

impl SqliteKeyStore {
    /// Create a new SQLite key store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_signing_key(row: &SqliteRow) -> Result<SigningKey> {
        Ok(SigningKey {
            key_id: column(row, "key_id")?,
            symmetric_key_id: column(row, "symmetric_key_id")?,
            jwk: column(row, "jwk")?,
            created_at: timestamp_column(row, "created_at")?,
        })
    }

    fn row_to_symmetric_key(row: &SqliteRow) -> Result<SymmetricKey> {
        Ok(SymmetricKey {
            key_id: column(row, "key_id")?,
            aead: column(row, "aead")?,
            created_at: timestamp_column(row, "created_at")?,
        })
    }

    async fn sequence_value(&self, name: &str) -> Result<Option<String>> {
        let query = format!("SELECT {} AS key_id FROM key_sequence WHERE id = 1", name);
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        match row {
            Some(row) => column(&row, "key_id"),
            None => Ok(None),
        }
    }

    async fn update_sequence(&self, name: &str, key_id: &str) -> Result<()> {
        let query = format!("UPDATE key_sequence SET {} = ? WHERE id = 1", name);
        let result = sqlx::query(&query)
            .bind(key_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("key_sequence row".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SigningKeyStore for SqliteKeyStore {
    async fn store_signing_key(&self, key: &SigningKey) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO signing_keys (key_id, symmetric_key_id, jwk, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&key.key_id)
        .bind(&key.symmetric_key_id)
        .bind(&key.jwk)
        .bind(format_timestamp(&key.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn list_signing_keys(&self) -> Result<Vec<SigningKey>> {
        let rows = sqlx::query("SELECT * FROM signing_keys ORDER BY created_at DESC, key_id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_signing_key).collect()
    }

    async fn delete_all_signing_keys(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM signing_keys")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl SymmetricKeyStore for SqliteKeyStore {
    async fn store_symmetric_key(&self, key: &SymmetricKey) -> Result<()> {
        sqlx::query("INSERT INTO symmetric_keys (key_id, aead, created_at) VALUES (?, ?, ?)")
            .bind(&key.key_id)
            .bind(&key.aead)
            .bind(format_timestamp(&key.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn list_symmetric_keys(&self) -> Result<Vec<SymmetricKey>> {
        let rows =
            sqlx::query("SELECT * FROM symmetric_keys ORDER BY created_at DESC, key_id DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_symmetric_key).collect()
    }
}

#[async_trait]
impl KeySequenceStore for SqliteKeyStore {
    async fn current_signing_key_id(&self) -> Result<Option<String>> {
        self.sequence_value("signing_key_id").await
    }

    async fn current_symmetric_key_id(&self) -> Result<Option<String>> {
        self.sequence_value("symmetric_key_id").await
    }

    async fn update_signing_key_id(&self, key_id: &str) -> Result<()> {
        self.update_sequence("signing_key_id", key_id).await
    }

    async fn update_symmetric_key_id(&self, key_id: &str) -> Result<()> {
        self.update_sequence("symmetric_key_id", key_id).await
    }
}
