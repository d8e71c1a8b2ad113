//! RSA signing keys persisted as private JWKs.

use base64::prelude::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::rngs::OsRng;
use rsa::{
    BigUint, RsaPrivateKey,
    pkcs1::EncodeRsaPrivateKey,
    traits::{PrivateKeyParts, PublicKeyParts},
};
use serde::{Deserialize, Serialize};

use crate::errors::TokenError;

pub const SIGNING_ALGORITHM: &str = "RS256";
const RSA_KEY_BITS: usize = 2048;

/// Key id for a signing key created at `now`
pub fn signing_key_id(now: DateTime<Utc>) -> String {
    format!("key_{}", now.format("%Y_%m_%d_%H_%M_%S_%3f"))
}

/// Private RSA JWK with base64url encoded components
#[derive(Clone, Serialize, Deserialize)]
pub struct RsaJwk {
    pub kty: String,
    pub kid: String,
    pub alg: String,
    pub n: String,
    pub e: String,
    pub d: String,
    pub p: String,
    pub q: String,
}

/// Public half of a signing key as published in the JWKS
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub kid: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub n: String,
    pub e: String,
}

fn encode_component(value: &BigUint) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn decode_component(name: &str, value: &str) -> Result<BigUint, TokenError> {
    BASE64_URL_SAFE_NO_PAD
        .decode(value)
        .map(|bytes| BigUint::from_bytes_be(&bytes))
        .map_err(|e| TokenError::Serialization(format!("invalid JWK component {}: {}", name, e)))
}

impl RsaJwk {
    /// Generate a 2048-bit key. CPU bound, run it off the async executor.
    pub fn generate(kid: String) -> Result<Self, TokenError> {
        let key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| TokenError::KeyGeneration(e.to_string()))?;
        Self::from_private_key(kid, &key)
    }

    pub fn from_private_key(kid: String, key: &RsaPrivateKey) -> Result<Self, TokenError> {
        let primes = key.primes();
        if primes.len() != 2 {
            return Err(TokenError::KeyGeneration(format!(
                "expected two primes, got {}",
                primes.len()
            )));
        }
        Ok(Self {
            kty: "RSA".to_string(),
            kid,
            alg: SIGNING_ALGORITHM.to_string(),
            n: encode_component(key.n()),
            e: encode_component(key.e()),
            d: encode_component(key.d()),
            p: encode_component(&primes[0]),
            q: encode_component(&primes[1]),
        })
    }

    pub fn to_private_key(&self) -> Result<RsaPrivateKey, TokenError> {
        RsaPrivateKey::from_components(
            decode_component("n", &self.n)?,
            decode_component("e", &self.e)?,
            decode_component("d", &self.d)?,
            vec![
                decode_component("p", &self.p)?,
                decode_component("q", &self.q)?,
            ],
        )
        .map_err(|e| TokenError::Crypto(e.to_string()))
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, TokenError> {
        let der = self
            .to_private_key()?
            .to_pkcs1_der()
            .map_err(|e| TokenError::Crypto(e.to_string()))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }

    pub fn decoding_key(&self) -> Result<DecodingKey, TokenError> {
        DecodingKey::from_rsa_components(&self.n, &self.e)
            .map_err(|e| TokenError::Crypto(e.to_string()))
    }

    pub fn public_jwk(&self) -> PublicJwk {
        PublicJwk {
            kty: self.kty.clone(),
            kid: self.kid.clone(),
            alg: self.alg.clone(),
            key_use: "sig".to_string(),
            n: self.n.clone(),
            e: self.e.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signing_key_id_format() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(42))
            .unwrap();
        assert_eq!(signing_key_id(now), "key_2024_03_09_14_05_07_042");
    }

    #[test]
    fn test_signing_key_ids_sort_by_time() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 11, 1, 10, 0, 0).unwrap();
        assert!(signing_key_id(earlier) < signing_key_id(later));
    }

    #[test]
    fn test_generate_and_restore() {
        let jwk = RsaJwk::generate("key_test".to_string()).unwrap();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.alg, "RS256");

        let json = serde_json::to_string(&jwk).unwrap();
        let restored: RsaJwk = serde_json::from_str(&json).unwrap();
        let key = restored.to_private_key().unwrap();
        assert_eq!(encode_component(key.n()), jwk.n);

        assert!(restored.encoding_key().is_ok());
        assert!(restored.decoding_key().is_ok());
    }

    #[test]
    fn test_public_jwk_omits_private_parts() {
        let jwk = RsaJwk::generate("key_public".to_string()).unwrap();
        let public = serde_json::to_value(jwk.public_jwk()).unwrap();

        assert_eq!(public["kid"], "key_public");
        assert_eq!(public["use"], "sig");
        assert!(public.get("d").is_none());
        assert!(public.get("p").is_none());
        assert!(public.get("q").is_none());
    }
}
