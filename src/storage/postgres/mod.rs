//! PostgreSQL storage implementations
//!
//! This module provides PostgreSQL-based implementations of all storage traits.
//! PostgreSQL is suitable for deployments running several server processes.

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
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::types::Json;
use sqlx::{Decode, Row, Type};
use std::sync::Arc;

pub use access_tokens::PostgresAccessTokenStore;
pub use authorization_codes::PostgresAuthorizationCodeStore;
pub use keys::PostgresKeyStore;
pub use oauth_clients::PostgresOpenIDClientStore;
pub use refresh_tokens::PostgresRefreshTokenStore;
pub use users::PostgresUserStore;

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StorageError::DatabaseError(format!("Failed to get {}: {}", name, e)))
}

fn json_column<T: DeserializeOwned>(row: &PgRow, name: &str) -> Result<T> {
    let Json(value): Json<T> = column(row, name)?;
    Ok(value)
}

/// Comprehensive PostgreSQL OAuth storage implementation
pub struct PostgresOAuthStorage {
    pool: PgPool,
    key_store: Arc<PostgresKeyStore>,
    client_store: Arc<PostgresOpenIDClientStore>,
    user_store: Arc<PostgresUserStore>,
    authorization_code_store: Arc<PostgresAuthorizationCodeStore>,
    access_token_store: Arc<PostgresAccessTokenStore>,
    refresh_token_store: Arc<PostgresRefreshTokenStore>,
}

impl PostgresOAuthStorage {
    /// Create a new PostgreSQL OAuth storage instance
    pub fn new(pool: PgPool) -> Self {
        let key_store = Arc::new(PostgresKeyStore::new(pool.clone()));
        let client_store = Arc::new(PostgresOpenIDClientStore::new(pool.clone()));
        let user_store = Arc::new(PostgresUserStore::new(pool.clone()));
        let authorization_code_store = Arc::new(PostgresAuthorizationCodeStore::new(pool.clone()));
        let access_token_store = Arc::new(PostgresAccessTokenStore::new(pool.clone()));
        let refresh_token_store = Arc::new(PostgresRefreshTokenStore::new(pool.clone()));

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
        sqlx::migrate!("./migrations/postgres")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl SigningKeyStore for PostgresOAuthStorage {
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
impl SymmetricKeyStore for PostgresOAuthStorage {
    async fn store_symmetric_key(&self, key: &SymmetricKey) -> Result<()> {
        self.key_store.store_symmetric_key(key).await
    }

    async fn list_symmetric_keys(&self) -> Result<Vec<SymmetricKey>> {
        self.key_store.list_symmetric_keys().await
    }
}

#[async_trait]
impl KeySequenceStore for PostgresOAuthStorage {
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
impl OpenIDClientStore for PostgresOAuthStorage {
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
impl UserStore for PostgresOAuthStorage {
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
impl AuthorizationCodeStore for PostgresOAuthStorage {
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
impl AccessTokenStore for PostgresOAuthStorage {
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
impl RefreshTokenStore for PostgresOAuthStorage {
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
impl OAuthStorage for PostgresOAuthStorage {}
