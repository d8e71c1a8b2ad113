//! Signing and symmetric key lifecycle with cross-process cache coherence.
//!
//! Key material lives in two layers. The key encryption root wraps symmetric
//! keysets, and the current symmetric keyset seals every new RSA signing key.
//! Each process keeps an immutable snapshot of the unwrapped keys per layer.
//! Before every cryptographic operation the snapshot's current key id is
//! compared with the shared key sequence and the snapshot is rebuilt
//! and swapped when another process rolled a key over. This is eventually
//! consistent: a process adopts a rollover on its next operation, never earlier.
//!
//! Concurrent signing rollovers are not serialized. If process A stores its key,
//! process B stores a newer key and updates the sequence, and A then writes its
//! older id to the sequence, the sequence names A's key while every rebuilt
//! snapshot picks the newest record (B's). The mismatch then reloads the
//! snapshot on every operation until the next rollover writes the newest id
//! again. Rollovers are operator actions, so run them from one place at a time.
//!
//! Callers receive an `Arc` of the snapshot and use that same value for the
//! whole operation.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::TokenError;
use crate::keys::EncryptedTokenValue;
use crate::keys::aead::AeadKeyset;
use crate::keys::rsa_jwk::{PublicJwk, RsaJwk, signing_key_id};
use crate::storage::{OAuthStorage, SigningKey, SymmetricKey};

/// Unwrapped signing key ready for use
#[derive(Clone)]
pub struct SigningMaterial {
    pub key_id: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    pub public: PublicJwk,
}

/// Immutable view of all retained signing keys
#[derive(Default)]
pub struct SigningKeys {
    current_key_id: String,
    keys: HashMap<String, SigningMaterial>,
    jwks: Vec<PublicJwk>,
}

impl SigningKeys {
    pub fn current_key_id(&self) -> &str {
        &self.current_key_id
    }

    pub fn get(&self, key_id: &str) -> Option<&SigningMaterial> {
        self.keys.get(key_id)
    }

    /// Public keys, newest first
    pub fn public_keys(&self) -> &[PublicJwk] {
        &self.jwks
    }

    fn current(&self) -> Result<&SigningMaterial, TokenError> {
        self.require(&self.current_key_id)
    }

    fn require(&self, key_id: &str) -> Result<&SigningMaterial, TokenError> {
        self.keys.get(key_id).ok_or_else(|| TokenError::UnknownKey {
            key_id: key_id.to_string(),
            known: self.jwks.iter().map(|jwk| jwk.kid.clone()).collect(),
        })
    }
}

/// Immutable view of all retained symmetric keysets
#[derive(Default)]
pub struct SymmetricKeys {
    current_key_id: String,
    keysets: HashMap<String, AeadKeyset>,
}

impl SymmetricKeys {
    pub fn current_key_id(&self) -> &str {
        &self.current_key_id
    }

    pub fn get(&self, key_id: &str) -> Option<&AeadKeyset> {
        self.keysets.get(key_id)
    }

    fn current(&self) -> Result<&AeadKeyset, TokenError> {
        self.require(&self.current_key_id)
    }

    fn require(&self, key_id: &str) -> Result<&AeadKeyset, TokenError> {
        self.keysets.get(key_id).ok_or_else(|| {
            let mut known: Vec<String> = self.keysets.keys().cloned().collect();
            known.sort();
            TokenError::UnknownKey {
                key_id: key_id.to_string(),
                known,
            }
        })
    }
}

/// Owns the key caches and performs initialization and rollover
pub struct KeyManager {
    root: AeadKeyset,
    associated_data: Vec<u8>,
    storage: Arc<dyn OAuthStorage>,
    signing: RwLock<Arc<SigningKeys>>,
    symmetric: RwLock<Arc<SymmetricKeys>>,
}

impl KeyManager {
    /// Create a manager with empty caches. Call [`KeyManager::initialize`] before use.
    pub fn new(root: AeadKeyset, associated_data: &str, storage: Arc<dyn OAuthStorage>) -> Self {
        Self {
            root,
            associated_data: associated_data.as_bytes().to_vec(),
            storage,
            signing: RwLock::new(Arc::new(SigningKeys::default())),
            symmetric: RwLock::new(Arc::new(SymmetricKeys::default())),
        }
    }

    /// Load both key layers, creating initial keys when the repositories are empty
    pub async fn initialize(&self) -> Result<(), TokenError> {
        self.initialize_symmetric_keys().await?;
        self.initialize_signing_keys().await?;
        Ok(())
    }

    /// Rebuild the symmetric snapshot from storage.
    ///
    /// When no symmetric key exists yet every signing key is discarded, since
    /// none of them can be unsealed anymore, and a fresh keyset is created.
    pub async fn initialize_symmetric_keys(&self) -> Result<Arc<SymmetricKeys>, TokenError> {
        let mut records = self.storage.list_symmetric_keys().await?;

        if records.is_empty() {
            let removed = self.storage.delete_all_signing_keys().await?;
            tracing::info!(
                removed_signing_keys = removed,
                "no symmetric keys found, generating initial keyset"
            );
            let record = self.create_symmetric_key().await?;
            records.push(record);
        }

        let mut keysets = HashMap::with_capacity(records.len());
        for record in &records {
            let keyset = AeadKeyset::unwrap_keyset(&self.root, &record.aead)?;
            keysets.insert(record.key_id.clone(), keyset);
        }

        let snapshot = Arc::new(SymmetricKeys {
            current_key_id: records[0].key_id.clone(),
            keysets,
        });
        tracing::debug!(
            current_key_id = %snapshot.current_key_id,
            count = snapshot.keysets.len(),
            "symmetric keys loaded"
        );
        *self.symmetric.write().await = snapshot.clone();
        Ok(snapshot)
    }

    /// Rebuild the signing snapshot from storage, creating a key when none is usable
    pub async fn initialize_signing_keys(&self) -> Result<Arc<SigningKeys>, TokenError> {
        let symmetric = self.ensure_latest_symmetric_keys().await?;

        let mut records: Vec<SigningKey> = self
            .storage
            .list_signing_keys()
            .await?
            .into_iter()
            .filter(|record| {
                record
                    .symmetric_key_id
                    .as_deref()
                    .is_some_and(|id| !id.is_empty())
            })
            .collect();

        if records.is_empty() {
            tracing::info!("no signing keys found, generating initial signing key");
            let record = self.create_signing_key(&symmetric).await?;
            records.push(record);
        }

        let mut keys = HashMap::with_capacity(records.len());
        let mut jwks = Vec::with_capacity(records.len());
        for record in &records {
            let material = self.unseal_signing_key(&symmetric, record)?;
            jwks.push(material.public.clone());
            keys.insert(material.key_id.clone(), material);
        }

        let snapshot = Arc::new(SigningKeys {
            current_key_id: records[0].key_id.clone(),
            keys,
            jwks,
        });
        tracing::debug!(
            current_key_id = %snapshot.current_key_id,
            count = snapshot.keys.len(),
            "signing keys loaded"
        );
        *self.signing.write().await = snapshot.clone();
        Ok(snapshot)
    }

    /// Create a new signing key sealed with the current symmetric key and make it current
    pub async fn rollover_signing_key(&self) -> Result<SigningKey, TokenError> {
        let symmetric = self.ensure_latest_symmetric_keys().await?;
        let record = self.create_signing_key(&symmetric).await?;
        self.initialize_signing_keys().await?;
        tracing::info!(key_id = %record.key_id, "signing key rolled over");
        Ok(record)
    }

    /// Create a new symmetric keyset and make it current. Existing signing keys stay sealed
    /// with the keyset they were created under.
    pub async fn rollover_symmetric_key(&self) -> Result<SymmetricKey, TokenError> {
        let record = self.create_symmetric_key().await?;
        self.initialize_symmetric_keys().await?;
        tracing::info!(key_id = %record.key_id, "symmetric key rolled over");
        Ok(record)
    }

    /// Signing snapshot that is current with respect to the shared key sequence
    pub async fn ensure_latest_signing_keys(&self) -> Result<Arc<SigningKeys>, TokenError> {
        let snapshot = self.signing.read().await.clone();
        match self.storage.current_signing_key_id().await? {
            Some(latest) if latest != snapshot.current_key_id => {
                tracing::warn!(
                    cached = %snapshot.current_key_id,
                    latest = %latest,
                    "stale signing key cache, reloading"
                );
                self.initialize_signing_keys().await
            }
            _ if snapshot.keys.is_empty() => self.initialize_signing_keys().await,
            _ => Ok(snapshot),
        }
    }

    /// Symmetric snapshot that is current with respect to the shared key sequence
    pub async fn ensure_latest_symmetric_keys(&self) -> Result<Arc<SymmetricKeys>, TokenError> {
        let snapshot = self.symmetric.read().await.clone();
        match self.storage.current_symmetric_key_id().await? {
            Some(latest) if latest != snapshot.current_key_id => {
                tracing::warn!(
                    cached = %snapshot.current_key_id,
                    latest = %latest,
                    "stale symmetric key cache, reloading"
                );
                self.initialize_symmetric_keys().await
            }
            _ if snapshot.keysets.is_empty() => self.initialize_symmetric_keys().await,
            _ => Ok(snapshot),
        }
    }

    pub async fn ensure_latest_signing_key_id(&self) -> Result<String, TokenError> {
        Ok(self
            .ensure_latest_signing_keys()
            .await?
            .current_key_id
            .clone())
    }

    pub async fn ensure_latest_symmetric_key_id(&self) -> Result<String, TokenError> {
        Ok(self
            .ensure_latest_symmetric_keys()
            .await?
            .current_key_id
            .clone())
    }

    /// Sign `claims` as an RS256 JWT with the current signing key
    pub async fn sign<T: Serialize>(&self, claims: &T) -> Result<EncryptedTokenValue, TokenError> {
        let snapshot = self.ensure_latest_signing_keys().await?;
        let material = snapshot.current()?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(material.key_id.clone());

        let value = jsonwebtoken::encode(&header, claims, &material.encoding)
            .map_err(|e| TokenError::Crypto(format!("signing failed: {}", e)))?;
        Ok(EncryptedTokenValue {
            value,
            key_id: material.key_id.clone(),
        })
    }

    /// Verify an RS256 JWT against the key named in its header and return its claims.
    ///
    /// Expiry and audience are not checked here; they are the consumer's concern.
    pub async fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| TokenError::InvalidSignature(format!("unparseable JWT: {}", e)))?;
        let key_id = header
            .kid
            .ok_or_else(|| TokenError::InvalidSignature("JWT header has no kid".to_string()))?;

        let mut snapshot = self.ensure_latest_signing_keys().await?;
        if snapshot.get(&key_id).is_none() {
            tracing::debug!(key_id = %key_id, "unknown signing key, refreshing cache");
            snapshot = self.initialize_signing_keys().await?;
        }
        let material = snapshot.require(&key_id)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<T>(token, &material.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::InvalidSignature(e.to_string()))
    }

    /// Seal `plaintext` with the current symmetric key and the server-wide associated data
    pub async fn encrypt_aead(&self, plaintext: &[u8]) -> Result<EncryptedTokenValue, TokenError> {
        let snapshot = self.ensure_latest_symmetric_keys().await?;
        let keyset = snapshot.current()?;
        Ok(EncryptedTokenValue {
            value: keyset.seal(plaintext, &self.associated_data)?,
            key_id: snapshot.current_key_id.clone(),
        })
    }

    /// Open a value sealed by [`KeyManager::encrypt_aead`] with the keyset `key_id`
    pub async fn decrypt_aead(&self, sealed: &str, key_id: &str) -> Result<Vec<u8>, TokenError> {
        let mut snapshot = self.ensure_latest_symmetric_keys().await?;
        if snapshot.get(key_id).is_none() {
            tracing::debug!(key_id = %key_id, "unknown symmetric key, refreshing cache");
            snapshot = self.initialize_symmetric_keys().await?;
        }
        snapshot.require(key_id)?.open(sealed, &self.associated_data)
    }

    /// Public keys of every retained signing key
    pub async fn public_keys(&self) -> Result<Vec<PublicJwk>, TokenError> {
        Ok(self.ensure_latest_signing_keys().await?.jwks.clone())
    }

    async fn create_symmetric_key(&self) -> Result<SymmetricKey, TokenError> {
        let keyset = AeadKeyset::generate();
        let record = SymmetricKey {
            key_id: keyset.key_id(),
            aead: keyset.wrap(&self.root)?,
            created_at: Utc::now(),
        };
        self.storage.store_symmetric_key(&record).await?;
        self.storage.update_symmetric_key_id(&record.key_id).await?;
        Ok(record)
    }

    async fn create_signing_key(
        &self,
        symmetric: &SymmetricKeys,
    ) -> Result<SigningKey, TokenError> {
        let created_at = Utc::now();
        let key_id = signing_key_id(created_at);
        let jwk = tokio::task::spawn_blocking(move || RsaJwk::generate(key_id))
            .await
            .map_err(|e| TokenError::KeyGeneration(e.to_string()))??;

        let json = serde_json::to_vec(&jwk).map_err(|e| TokenError::Serialization(e.to_string()))?;
        let record = SigningKey {
            key_id: jwk.kid.clone(),
            symmetric_key_id: Some(symmetric.current_key_id.clone()),
            jwk: symmetric.current()?.seal(&json, &self.associated_data)?,
            created_at,
        };
        self.storage.store_signing_key(&record).await?;
        self.storage.update_signing_key_id(&record.key_id).await?;
        Ok(record)
    }

    fn unseal_signing_key(
        &self,
        symmetric: &SymmetricKeys,
        record: &SigningKey,
    ) -> Result<SigningMaterial, TokenError> {
        let symmetric_key_id = record.symmetric_key_id.as_deref().unwrap_or_default();
        let json = symmetric
            .require(symmetric_key_id)?
            .open(&record.jwk, &self.associated_data)?;
        let jwk: RsaJwk =
            serde_json::from_slice(&json).map_err(|e| TokenError::Serialization(e.to_string()))?;
        Ok(SigningMaterial {
            key_id: jwk.kid.clone(),
            encoding: jwk.encoding_key()?,
            decoding: jwk.decoding_key()?,
            public: jwk.public_jwk(),
        })
    }
}
