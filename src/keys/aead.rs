//! AES-256-GCM keysets used both as the key encryption root and as the
//! symmetric content-encryption keys it wraps.
//!
//! A sealed value is `base64(nonce || ciphertext)` using the standard alphabet.
//! The serialized keyset shape is `{"primaryKeyId": u32, "key": "<base64>"}`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::prelude::*;
use rand::{Rng, RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

use crate::errors::TokenError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A single AES-256-GCM key identified by its numeric primary key id
#[derive(Clone)]
pub struct AeadKeyset {
    primary_key_id: u32,
    key: [u8; KEY_LEN],
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedKeyset {
    primary_key_id: u32,
    key: String,
}

impl std::fmt::Debug for AeadKeyset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadKeyset")
            .field("primary_key_id", &self.primary_key_id)
            .finish_non_exhaustive()
    }
}

impl AeadKeyset {
    /// Generate a fresh keyset from the operating system RNG
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self {
            primary_key_id: OsRng.gen_range(1..u32::MAX),
            key,
        }
    }

    pub fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    /// Key id as persisted in symmetric key records and the key sequence
    pub fn key_id(&self) -> String {
        self.primary_key_id.to_string()
    }

    fn cipher(&self) -> Result<Aes256Gcm, TokenError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| TokenError::Crypto(e.to_string()))
    }

    /// Encrypt and authenticate `plaintext`, binding it to `associated_data`
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<String, TokenError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()?
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|e| TokenError::Crypto(format!("seal failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(sealed))
    }

    /// Reverse of [`AeadKeyset::seal`]
    pub fn open(&self, sealed: &str, associated_data: &[u8]) -> Result<Vec<u8>, TokenError> {
        let decoded = BASE64_STANDARD
            .decode(sealed)
            .map_err(|e| TokenError::Crypto(format!("sealed value is not base64: {}", e)))?;
        if decoded.len() <= NONCE_LEN {
            return Err(TokenError::Crypto("sealed value is too short".to_string()));
        }

        let (nonce, ciphertext) = decoded.split_at(NONCE_LEN);
        self.cipher()?
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|e| TokenError::Crypto(format!("open failed: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, TokenError> {
        serde_json::to_string(&SerializedKeyset {
            primary_key_id: self.primary_key_id,
            key: BASE64_STANDARD.encode(self.key),
        })
        .map_err(|e| TokenError::Serialization(e.to_string()))
    }

    pub fn from_json(value: &str) -> Result<Self, TokenError> {
        let serialized: SerializedKeyset =
            serde_json::from_str(value).map_err(|e| TokenError::Serialization(e.to_string()))?;
        let key = BASE64_STANDARD
            .decode(&serialized.key)
            .map_err(|e| TokenError::Serialization(format!("key is not base64: {}", e)))?;
        let key: [u8; KEY_LEN] = key.try_into().map_err(|key: Vec<u8>| {
            TokenError::Serialization(format!(
                "expected a {} byte key, got {} bytes",
                KEY_LEN,
                key.len()
            ))
        })?;
        Ok(Self {
            primary_key_id: serialized.primary_key_id,
            key,
        })
    }

    /// Seal this keyset under `root` for persistence
    pub fn wrap(&self, root: &AeadKeyset) -> Result<String, TokenError> {
        root.seal(self.to_json()?.as_bytes(), &[])
    }

    /// Recover a keyset previously sealed with [`AeadKeyset::wrap`]
    pub fn unwrap_keyset(root: &AeadKeyset, wrapped: &str) -> Result<Self, TokenError> {
        let json = root.open(wrapped, &[])?;
        let json = String::from_utf8(json).map_err(|e| TokenError::Serialization(e.to_string()))?;
        Self::from_json(&json)
    }
}
