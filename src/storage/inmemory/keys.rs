//! In-memory key material storage

use super::oauth::MemoryOAuthStorage;
use crate::errors::StorageError;
use crate::storage::traits::*;
use async_trait::async_trait;

#[async_trait]
impl SigningKeyStore for MemoryOAuthStorage {
    async fn store_signing_key(&self, key: &SigningKey) -> Result<()> {
        let mut keys = self.signing_keys.write().await;
        if keys.iter().any(|existing| existing.key_id == key.key_id) {
            return Err(StorageError::InvalidData(format!(
                "signing key {} already exists",
                key.key_id
            )));
        }
        keys.push(key.clone());
        Ok(())
    }

    async fn list_signing_keys(&self) -> Result<Vec<SigningKey>> {
        let mut keys = self.signing_keys.read().await.clone();
        keys.sort_by(|a, b| (b.created_at, &b.key_id).cmp(&(a.created_at, &a.key_id)));
        Ok(keys)
    }

    async fn delete_all_signing_keys(&self) -> Result<usize> {
        let mut keys = self.signing_keys.write().await;
        let removed = keys.len();
        keys.clear();
        Ok(removed)
    }
}

#[async_trait]
impl SymmetricKeyStore for MemoryOAuthStorage {
    async fn store_symmetric_key(&self, key: &SymmetricKey) -> Result<()> {
        let mut keys = self.symmetric_keys.write().await;
        if keys.iter().any(|existing| existing.key_id == key.key_id) {
            return Err(StorageError::InvalidData(format!(
                "symmetric key {} already exists",
                key.key_id
            )));
        }
        keys.push(key.clone());
        Ok(())
    }

    async fn list_symmetric_keys(&self) -> Result<Vec<SymmetricKey>> {
        let mut keys = self.symmetric_keys.read().await.clone();
        keys.sort_by(|a, b| (b.created_at, &b.key_id).cmp(&(a.created_at, &a.key_id)));
        Ok(keys)
    }
}

#[async_trait]
impl KeySequenceStore for MemoryOAuthStorage {
    async fn current_signing_key_id(&self) -> Result<Option<String>> {
        Ok(self.signing_key_sequence.read().await.clone())
    }

    async fn current_symmetric_key_id(&self) -> Result<Option<String>> {
        Ok(self.symmetric_key_sequence.read().await.clone())
    }

    async fn update_signing_key_id(&self, key_id: &str) -> Result<()> {
        *self.signing_key_sequence.write().await = Some(key_id.to_string());
        Ok(())
    }

    async fn update_symmetric_key_id(&self, key_id: &str) -> Result<()> {
        *self.symmetric_key_sequence.write().await = Some(key_id.to_string());
        Ok(())
    }
}
