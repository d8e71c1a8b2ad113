//! In-memory OAuth storage implementation
//!
//! This module provides in-memory implementations for the client, user and
//! issued artifact storage traits.

use crate::errors::StorageError;
use crate::oauth::types::*;
use crate::storage::traits::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

pub type Result<T> = std::result::Result<T, StorageError>;

/// In-memory implementation for all storage traits
#[derive(Default)]
pub struct MemoryOAuthStorage {
    clients: Mutex<HashMap<String, OpenIDClient>>,
    users: Mutex<HashMap<String, User>>,
    auth_codes: Mutex<HashMap<String, AuthorizationCode>>,
    access_tokens: Mutex<HashMap<String, AccessToken>>,
    refresh_tokens: Mutex<HashMap<String, RefreshToken>>,
    // Key material
    pub(super) signing_keys: tokio::sync::RwLock<Vec<SigningKey>>,
    pub(super) symmetric_keys: tokio::sync::RwLock<Vec<SymmetricKey>>,
    pub(super) signing_key_sequence: tokio::sync::RwLock<Option<String>>,
    pub(super) symmetric_key_sequence: tokio::sync::RwLock<Option<String>>,
}

impl MemoryOAuthStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::SerializationFailed(format!("Lock error: {}", e))
}

#[async_trait]
impl OpenIDClientStore for MemoryOAuthStorage {
    async fn store_client(&self, client: &OpenIDClient) -> Result<()> {
        let mut clients = self.clients.lock().map_err(lock_error)?;
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OpenIDClient>> {
        let clients = self.clients.lock().map_err(lock_error)?;
        Ok(clients.get(client_id).cloned())
    }

    async fn list_clients(&self, limit: Option<usize>) -> Result<Vec<OpenIDClient>> {
        let clients = self.clients.lock().map_err(lock_error)?;
        let mut result: Vec<_> = clients.values().cloned().collect();
        result.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }
}

#[async_trait]
impl UserStore for MemoryOAuthStorage {
    async fn store_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().map_err(lock_error)?;
        users.insert(user.sub.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, sub: &str) -> Result<Option<User>> {
        let users = self.users.lock().map_err(lock_error)?;
        Ok(users.get(sub).cloned())
    }

    async fn delete_user(&self, sub: &str) -> Result<()> {
        let mut users = self.users.lock().map_err(lock_error)?;
        users.remove(sub);
        Ok(())
    }

    async fn delete_users_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut users = self.users.lock().map_err(lock_error)?;
        let before = users.len();
        users.retain(|_, user| user.created_at >= cutoff);
        Ok(before - users.len())
    }
}

#[async_trait]
impl AuthorizationCodeStore for MemoryOAuthStorage {
    async fn store_code(&self, code: &AuthorizationCode) -> Result<()> {
        let mut codes = self.auth_codes.lock().map_err(lock_error)?;
        codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        let codes = self.auth_codes.lock().map_err(lock_error)?;
        Ok(codes.get(code).cloned())
    }

    async fn delete_expired_codes(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut codes = self.auth_codes.lock().map_err(lock_error)?;
        let before = codes.len();
        codes.retain(|_, code| code.expires_at >= now);
        Ok(before - codes.len())
    }
}

#[async_trait]
impl AccessTokenStore for MemoryOAuthStorage {
    async fn store_access_token(&self, token: &AccessToken) -> Result<()> {
        let mut tokens = self.access_tokens.lock().map_err(lock_error)?;
        tokens.insert(token.value.clone(), token.clone());
        Ok(())
    }

    async fn find_access_token(&self, value: &str) -> Result<Option<AccessToken>> {
        let tokens = self.access_tokens.lock().map_err(lock_error)?;
        Ok(tokens.get(value).cloned())
    }

    async fn delete_expired_access_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tokens = self.access_tokens.lock().map_err(lock_error)?;
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at >= now);
        Ok(before - tokens.len())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryOAuthStorage {
    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        let mut tokens = self.refresh_tokens.lock().map_err(lock_error)?;
        tokens.insert(token.value.clone(), token.clone());
        Ok(())
    }

    async fn find_refresh_token(&self, value: &str) -> Result<Option<RefreshToken>> {
        let tokens = self.refresh_tokens.lock().map_err(lock_error)?;
        Ok(tokens.get(value).cloned())
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tokens = self.refresh_tokens.lock().map_err(lock_error)?;
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at >= now);
        Ok(before - tokens.len())
    }
}

impl OAuthStorage for MemoryOAuthStorage {}
