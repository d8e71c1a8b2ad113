//! Key material: the key encryption root, symmetric keysets and RSA signing keys.

pub mod aead;
pub mod manager;
pub mod rsa_jwk;

pub use aead::AeadKeyset;
pub use manager::{KeyManager, SigningKeys, SymmetricKeys};
pub use rsa_jwk::{PublicJwk, RsaJwk, SIGNING_ALGORITHM};

use serde::{Deserialize, Serialize};

/// Output of a signing or sealing operation together with the key that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedTokenValue {
    pub value: String,
    pub key_id: String,
}
