//! Trait-based storage abstractions with in-memory, SQLite, and PostgreSQL backends.

pub mod cleaner;
pub mod inmemory;
pub mod traits;

// Feature-gated storage implementations
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export commonly used types and traits
pub use inmemory::MemoryOAuthStorage;
pub use traits::*;

#[cfg(feature = "postgres")]
pub use postgres::PostgresOAuthStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteOAuthStorage;

use crate::errors::StorageError;
use std::sync::Arc;

/// Storage backend configuration and factory
#[derive(Clone, Debug, PartialEq)]
pub enum StorageBackend {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite(String), // Connection string/path
    #[cfg(feature = "postgres")]
    Postgres(String), // Connection string
}

/// Create a storage backend based on configuration
pub async fn create_storage_backend(
    backend: StorageBackend,
) -> std::result::Result<Arc<dyn OAuthStorage>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryOAuthStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite(database_url) => {
            let options = database_url
                .parse::<sqlx::sqlite::SqliteConnectOptions>()
                .map_err(|e| {
                    StorageError::ConnectionFailed(format!("Invalid SQLite URL: {}", e))
                })?
                .create_if_missing(true);
            let pool = sqlx::SqlitePool::connect_with(options)
                .await
                .map_err(|e| {
                    StorageError::ConnectionFailed(format!("SQLite connection failed: {}", e))
                })?;

            let storage = sqlite::SqliteOAuthStorage::new(pool);

            // Run migrations
            storage.migrate().await?;

            Ok(Arc::new(storage))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres(database_url) => {
            let pool = sqlx::postgres::PgPool::connect(&database_url)
                .await
                .map_err(|e| {
                    StorageError::ConnectionFailed(format!("PostgreSQL connection failed: {}", e))
                })?;

            let storage = postgres::PostgresOAuthStorage::new(pool);

            // Run migrations
            storage.migrate().await?;

            Ok(Arc::new(storage))
        }
    }
}

/// Parse storage backend from configuration string
pub fn parse_storage_backend(
    backend_name: &str,
    database_url: Option<&str>,
) -> std::result::Result<StorageBackend, StorageError> {
    match backend_name {
        "memory" => Ok(StorageBackend::Memory),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = database_url.unwrap_or("sqlite:oidcng.db");
            Ok(StorageBackend::Sqlite(url.to_string()))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = database_url.ok_or_else(|| {
                StorageError::InvalidData("DATABASE_URL required for postgres backend".to_string())
            })?;
            Ok(StorageBackend::Postgres(url.to_string()))
        }
        _ => Err(StorageError::InvalidData(format!(
            "Unknown storage backend: {}",
            backend_name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_backend() {
        assert_eq!(
            parse_storage_backend("memory", None).unwrap(),
            StorageBackend::Memory
        );
        assert!(matches!(
            parse_storage_backend("mongodb", None),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_requires_url() {
        assert!(parse_storage_backend("postgres", None).is_err());
        assert_eq!(
            parse_storage_backend("postgres", Some("postgres://localhost/oidcng")).unwrap(),
            StorageBackend::Postgres("postgres://localhost/oidcng".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let storage = create_storage_backend(StorageBackend::Memory).await.unwrap();
        assert!(storage.list_signing_keys().await.unwrap().is_empty());
    }
}
