//! Storage trait definitions for key material and OAuth data.
//!
//! Defines async storage interfaces for signing keys, symmetric keys, the
//! shared key sequence, clients, users and issued artifacts that can be
//! implemented by various backend providers.

use crate::errors::StorageError;
use crate::oauth::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, StorageError>;

// ===== Key Material =====

/// RSA signing key sealed with a symmetric key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKey {
    pub key_id: String,
    /// Symmetric key the JWK is sealed with. Records without one cannot be recovered.
    pub symmetric_key_id: Option<String>,
    /// Sealed private JWK
    pub jwk: String,
    pub created_at: DateTime<Utc>,
}

/// Symmetric keyset wrapped by the key encryption root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymmetricKey {
    pub key_id: String,
    /// Wrapped keyset
    pub aead: String,
    pub created_at: DateTime<Utc>,
}

/// Trait for storing signing key records
#[async_trait]
pub trait SigningKeyStore {
    /// Store a new signing key record
    async fn store_signing_key(&self, key: &SigningKey) -> Result<()>;

    /// All signing key records, newest first
    async fn list_signing_keys(&self) -> Result<Vec<SigningKey>>;

    /// Remove every signing key record, returning how many were removed
    async fn delete_all_signing_keys(&self) -> Result<usize>;
}

/// Trait for storing symmetric key records
#[async_trait]
pub trait SymmetricKeyStore {
    /// Store a new symmetric key record
    async fn store_symmetric_key(&self, key: &SymmetricKey) -> Result<()>;

    /// All symmetric key records, newest first
    async fn list_symmetric_keys(&self) -> Result<Vec<SymmetricKey>>;
}

/// Shared pointer to the current keys, read by every server process
#[async_trait]
pub trait KeySequenceStore {
    async fn current_signing_key_id(&self) -> Result<Option<String>>;

    async fn current_symmetric_key_id(&self) -> Result<Option<String>>;

    async fn update_signing_key_id(&self, key_id: &str) -> Result<()>;

    async fn update_symmetric_key_id(&self, key_id: &str) -> Result<()>;
}

// ===== OAuth Core Storage Traits =====

/// Trait for storing and retrieving registered clients
#[async_trait]
pub trait OpenIDClientStore {
    /// Store or replace a client
    async fn store_client(&self, client: &OpenIDClient) -> Result<()>;

    /// Get a client by its client id
    async fn get_client(&self, client_id: &str) -> Result<Option<OpenIDClient>>;

    /// List clients
    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OpenIDClient>>;
}

/// Trait for the ephemeral authenticated users
#[async_trait]
pub trait UserStore {
    /// Store or replace the user for its subject
    async fn store_user(&self, user: &User) -> Result<()>;

    async fn find_user(&self, sub: &str) -> Result<Option<User>>;

    async fn delete_user(&self, sub: &str) -> Result<()>;

    /// Remove users created before `cutoff`
    async fn delete_users_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Trait for storing authorization codes
#[async_trait]
pub trait AuthorizationCodeStore {
    /// Store an authorization code
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()>;

    /// Look up a code without consuming it
    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Remove codes that expired before `now`
    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Trait for storing access tokens
#[async_trait]
pub trait AccessTokenStore {
    /// Store an access token
    async fn store_access_token(&self, token: &AccessToken) -> Result<()>;

    /// Get an access token by its value
    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>>;

    /// Remove tokens that expired before `now`
    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Trait for storing refresh tokens
#[async_trait]
pub trait RefreshTokenStore {
    /// Store a refresh token
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()>;

    /// Get a refresh token by its value
    async fn find_refresh_token(&self, value: &str) -> Result<Option<RefreshToken>>;

    /// Remove tokens that expired before `now`
    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize>;
}

// ===== Combined Storage Trait =====

/// Combined storage trait
pub trait OAuthStorage:
    SigningKeyStore
    + SymmetricKeyStore
    + KeySequenceStore
    + OpenIDClientStore
    + UserStore
    + AuthorizationCodeStore
    + AccessTokenStore
    + RefreshTokenStore
    + Send
    + Sync
{
}
