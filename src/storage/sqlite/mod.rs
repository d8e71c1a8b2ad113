//! SQLite storage implementations
//!
//! This module provides SQLite-based implementations of all storage traits.
//! SQLite is suitable for single-instance deployments and development.

mod access_tokens;
mod authorization_codes;
mod keys;
mod oauth_clients;
mod refresh_tokens;
mod users;

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Decode, Row, Type};
use std::sync::Arc;

pub use access_tokens::SqliteAccessTokenStore;
pub use authorization_codes::SqliteAuthorizationCodeStore;
pub use keys::SqliteKeyStore;
pub use oauth_clients::SqliteOpenIDClientStore;
pub use refresh_tokens::SqliteRefreshTokenStore;
pub use users::SqliteUserStore;

/// Read a column, mapping decode failures to [`StorageError::DatabaseError`]
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", name, e)))
}

/// Timestamps are stored as fixed-width RFC 3339 text so they compare lexicographically
fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>> {
    let value: String = column(row, name)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("Invalid {} timestamp: {}", name, e)))
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, name: &str) -> Result<T> {
    let value: String = column(row, name)?;
    serde_json::from_str(&value)
        .map_err(|e| StorageError::SerializationFailed(format!("Invalid {}: {}", name, e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StorageError::SerializationFailed(e.to_string()))
}

/// Comprehensive SQLite OAuth storage implementation
pub struct SqliteOAuthStorage {
    pool: SqlitePool,
    key_store: Arc<SqliteKeyStore>,
    client_store: Arc<SqliteOpenIDClientStore>,
    user_store: Arc<SqliteUserStore>,
    authorization_code_store: Arc<SqliteAuthorizationCodeStore>,
    access_token_store: Arc<SqliteAccessTokenStore>,
    refresh_token_store: Arc<SqliteRefreshTokenStore>,
}

impl SqliteOAuthStorage {
    /// Create a new SQLite OAuth storage instance
    pub fn new(pool: SqlitePool) -> Self {
        let key_store = Arc::new(SqliteKeyStore::new(pool.clone()));
        let client_store = Arc::new(SqliteOpenIDClientStore::new(pool.clone()));
        let user_store = Arc::new(SqliteUserStore::new(pool.clone()));
        let authorization_code_store = Arc::new(SqliteAuthorizationCodeStore::new(pool.clone()));
        let access_token_store = Arc::new(SqliteAccessTokenStore::new(pool.clone()));
        let refresh_token_store = Arc::new(SqliteRefreshTokenStore::new(pool.clone()));

        Self {
            pool,
            key_store,
            client_store,
            user_store,
            authorization_code_store,
            access_token_store,
            refresh_token_store,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl SigningKeyStore for SqliteOAuthStorage {
    async fn store_signing_key(&self, key: &SigningKey) -> Result<()> {
        self.key_store.store_signing_key(key).await
    }

    async fn list_signing_keys(&self) -> Result<Vec<SigningKey>> {
        self.key_store.list_signing_keys().await
    }

    async fn delete_all_signing_keys(&self) -> Result<usize> {
        self.key_store.delete_all_signing_keys().await
    }
}

#[async_trait]
impl SymmetricKeyStore for SqliteOAuthStorage {
    async fn store_symmetric_key(&self, key: &SymmetricKey) -> Result<()> {
        self.key_store.store_symmetric_key(key).await
    }

    async fn list_symmetric_keys(&self) -> Result<Vec<SymmetricKey>> {
        self.key_store.list_symmetric_keys().await
    }
}

#[async_trait]
impl KeySequenceStore for SqliteOAuthStorage {
    async fn current_signing_key_id(&self) -> Result<Option<String>> {
        self.key_store.current_signing_key_id().await
    }

    async fn current_symmetric_key_id(&self) -> Result<Option<String>> {
        self.key_store.current_symmetric_key_id().await
    }

    async fn update_signing_key_id(&self, key_id: &str) -> Result<()> {
        self.key_store.update_signing_key_id(key_id).await
    }

    async fn update_symmetric_key_id(&self, key_id: &str) -> Result<()> {
        self.key_store.update_symmetric_key_id(key_id).await
    }
}

#[async_trait]
impl OpenIDClientStore for SqliteOAuthStorage {
    async fn store_client(&self, client: &OpenIDClient) -> Result<()> {
        self.client_store.store_client(client).await
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OpenIDClient>> {
        self.client_store.get_client(client_id).await
    }

    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OpenIDClient>> {
        self.client_store.list_clients(limit).await
    }
}

#[async_trait]
impl UserStore for SqliteOAuthStorage {
    async fn store_user(&self, user: &User) -> Result<()> {
        self.user_store.store_user(user).await
    }

    async fn find_user(&self, sub: &str) -> Result<Option<User>> {
        self.user_store.find_user(sub).await
    }

    async fn delete_user(&self, sub: &str) -> Result<()> {
        self.user_store.delete_user(sub).await
    }

    async fn delete_users_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.user_store.delete_users_created_before(cutoff).await
    }
}

#[async_trait]
impl AuthorizationCodeStore for SqliteOAuthStorage {
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()> {
        self.authorization_code_store.store_code(code).await
    }

    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        self.authorization_code_store.find_code(code).await
    }

    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> Result<usize> {
        self.authorization_code_store.delete_expired_codes(now).await
    }
}

#[async_trait]
impl AccessTokenStore for SqliteOAuthStorage {
    async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        self.access_token_store.store_access_token(token).await
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>> {
        self.access_token_store.find_access_token(value).await
    }

    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        self.access_token_store
            .delete_expired_access_tokens(now)
            .await
    }
}

#[async_trait]
impl RefreshTokenStore for SqliteOAuthStorage {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        self.refresh_token_store.store_refresh_token(token).await
    }

    async fn find_refresh_token(&self, value: &str) -> Result<Option<RefreshToken>> {
        self.refresh_token_store.find_refresh_token(value).await
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        self.refresh_token_store
            .delete_expired_refresh_tokens(now)
            .await
    }
}

// Implement the combined OAuthStorage trait
impl OAuthStorage for SqliteOAuthStorage {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_storage() -> SqliteOAuthStorage {
        // A single connection keeps the in-memory database alive for the whole test
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let storage = SqliteOAuthStorage::new(pool);
        storage.migrate().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_key_sequence_row() {
        let storage = setup_test_storage().await;
        assert!(storage.current_signing_key_id().await.unwrap().is_none());
        assert!(storage.current_symmetric_key_id().await.unwrap().is_none());

        storage.update_signing_key_id("key_2025_01_01_00_00_00_000").await.unwrap();
        storage.update_symmetric_key_id("1234").await.unwrap();
        storage.update_signing_key_id("key_2025_01_02_00_00_00_000").await.unwrap();

        assert_eq!(
            storage.current_signing_key_id().await.unwrap().as_deref(),
            Some("key_2025_01_02_00_00_00_000")
        );
        assert_eq!(
            storage.current_symmetric_key_id().await.unwrap().as_deref(),
            Some("1234")
        );
    }

    #[tokio::test]
    async fn test_signing_keys_newest_first() {
        let storage = setup_test_storage().await;
        let now = Utc::now();
        for (key_id, age) in [("key_old", 10), ("key_new", 0), ("key_mid", 5)] {
            storage
                .store_signing_key(&SigningKey {
                    key_id: key_id.to_string(),
                    symmetric_key_id: Some("1".to_string()),
                    jwk: "sealed".to_string(),
                    created_at: now - Duration::minutes(age),
                })
                .await
                .unwrap();
        }

        let ids: Vec<String> = storage
            .list_signing_keys()
            .await
            .unwrap()
            .into_iter()
            .map(|key| key.key_id)
            .collect();
        assert_eq!(ids, vec!["key_new", "key_mid", "key_old"]);
        assert_eq!(storage.delete_all_signing_keys().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_client_and_user_round_trip() {
        let storage = setup_test_storage().await;
        let mut client = OpenIDClient::new(
            "c1",
            vec!["https://rp/cb".to_string()],
            vec!["openid".to_string()],
            vec![GrantType::AuthorizationCode, GrantType::Implicit],
        );
        client.allowed_resource_servers = vec!["rs1".to_string()];
        storage.store_client(&client).await.unwrap();

        let found = storage.get_client("c1").await.unwrap().unwrap();
        assert_eq!(found.grants, client.grants);
        assert_eq!(found.allowed_resource_servers, vec!["rs1"]);
        assert!(storage.get_client("missing").await.unwrap().is_none());
        assert_eq!(storage.list_clients(Some(10)).await.unwrap().len(), 1);

        let mut user = User::new("u1");
        user.attributes
            .insert("email".to_string(), serde_json::json!("u1@example.com"));
        user.acr_claims = vec!["urn:loa2".to_string()];
        storage.store_user(&user).await.unwrap();
        storage.store_user(&user).await.unwrap();

        let found = storage.find_user("u1").await.unwrap().unwrap();
        assert_eq!(found.attributes, user.attributes);
        assert_eq!(found.acr_claims, user.acr_claims);

        storage.delete_user("u1").await.unwrap();
        assert!(storage.find_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_artifacts_removed() {
        let storage = setup_test_storage().await;
        let now = Utc::now();

        for (value, expires_at) in [("expired", now - Duration::hours(1)), ("valid", now + Duration::hours(1))] {
            storage
                .store_code(&AuthorizationCode {
                    code: value.to_string(),
                    sub: "u1".to_string(),
                    client_id: "c1".to_string(),
                    scopes: vec!["openid".to_string()],
                    redirect_uri: "https://rp/cb".to_string(),
                    nonce: Some("n".to_string()),
                    id_token_claims: vec!["email".to_string()],
                    code_challenge: None,
                    code_challenge_method: None,
                    created_at: now,
                    expires_at,
                    used: false,
                })
                .await
                .unwrap();
            storage
                .store_access_token(&AccessToken {
                    value: value.to_string(),
                    signing_key_id: "key_1".to_string(),
                    sub: "u1".to_string(),
                    client_id: "c1".to_string(),
                    scopes: vec!["openid".to_string()],
                    created_at: now,
                    expires_at,
                    client_credentials: false,
                })
                .await
                .unwrap();
            storage
                .store_refresh_token(&RefreshToken {
                    value: value.to_string(),
                    access_token_value: value.to_string(),
                    sub: "u1".to_string(),
                    client_id: "c1".to_string(),
                    scopes: vec!["openid".to_string()],
                    created_at: now,
                    expires_at,
                })
                .await
                .unwrap();
        }

        let code = storage.find_code("valid").await.unwrap().unwrap();
        assert_eq!(code.id_token_claims, vec!["email"]);
        assert_eq!(code.nonce.as_deref(), Some("n"));

        assert_eq!(storage.delete_expired_codes(now).await.unwrap(), 1);
        assert_eq!(storage.delete_expired_access_tokens(now).await.unwrap(), 1);
        assert_eq!(storage.delete_expired_refresh_tokens(now).await.unwrap(), 1);
        assert!(storage.find_code("expired").await.unwrap().is_none());
        assert!(storage.find_access_token("valid").await.unwrap().is_some());
        assert!(storage.find_refresh_token("valid").await.unwrap().is_some());
    }
}
