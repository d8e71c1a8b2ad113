//! OpenID Connect claims for ID tokens and embedded-identity access tokens.

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Claim names owned by the token builder that user attributes may not override
pub const REGISTERED_CLAIMS: &[&str] = &[
    "iss",
    "sub",
    "aud",
    "exp",
    "iat",
    "nbf",
    "jti",
    "acr",
    "auth_time",
    "nonce",
    "at_hash",
    "c_hash",
    "s_hash",
];

/// Claim carrying the sealed user info inside an access token
pub const EMBEDDED_CLAIMS: &str = "claims";

/// Claim carrying the id of the symmetric key that sealed [`EMBEDDED_CLAIMS`]
pub const EMBEDDED_CLAIMS_KEY_ID: &str = "claim_key_id";

/// Claims of every JWT this server issues
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenIDClaims {
    /// Issuer
    pub iss: String,

    /// Subject, the user's sub or the client id when no user is involved
    pub sub: String,

    /// Audience, the client id first
    pub aud: Vec<String>,

    pub exp: i64,

    pub iat: i64,

    pub nbf: i64,

    /// Unique token identifier
    pub jti: String,

    /// Authentication context class reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,

    /// Authentication time - Unix timestamp when user authenticated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Access token hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Code hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    /// State hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_hash: Option<String>,

    /// Requested user claims and custom claims
    #[serde(flatten)]
    pub additional_claims: serde_json::Map<String, serde_json::Value>,
}

impl OpenIDClaims {
    /// Set authentication time
    pub fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Set nonce value
    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set access token hash
    pub fn with_at_hash(mut self, access_token: &str) -> Self {
        self.at_hash = Some(calculate_hash(access_token));
        self
    }

    /// Set code hash
    pub fn with_c_hash(mut self, code: &str) -> Self {
        self.c_hash = Some(calculate_hash(code));
        self
    }

    /// Set state hash
    pub fn with_s_hash(mut self, state: &str) -> Self {
        self.s_hash = Some(calculate_hash(state));
        self
    }

    /// Add additional claim. Registered claim names are ignored.
    pub fn with_claim(mut self, key: &str, value: serde_json::Value) -> Self {
        if !REGISTERED_CLAIMS.contains(&key) {
            self.additional_claims.insert(key.to_string(), value);
        }
        self
    }
}

/// Left half of the SHA-256 digest, base64url encoded without padding.
///
/// This is the `at_hash`, `c_hash` and `s_hash` construction for RS256.
pub fn calculate_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Intersection of the asserted ACR values with the supported list, or `default_acr` when empty
pub fn negotiate_acr(asserted: &[String], supported: &[String], default_acr: &str) -> String {
    let valid: Vec<&str> = asserted
        .iter()
        .filter(|value| supported.contains(value))
        .map(String::as_str)
        .collect();
    if valid.is_empty() {
        default_acr.to_string()
    } else {
        valid.join(" ")
    }
}
