//! OAuth 2 / OpenID Connect core types and data structures.
//!
//! Defines the registered client, the ephemeral authenticated user, the issued
//! artifacts and the response type / response mode vocabulary of the
//! authorization endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scopes every client may request regardless of its registration
pub const FREE_SCOPES: &[&str] = &["profile", "email", "address", "phone"];

/// Scope that marks a request as an OpenID Connect request
pub const OPENID_SCOPE: &str = "openid";

/// OAuth 2 grant types a client can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Implicit,
    RefreshToken,
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Implicit => "implicit",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

fn default_token_validity() -> i64 {
    3600
}

/// Registered relying party, provisioned outside of this server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenIDClient {
    /// Unique client identifier
    pub client_id: String,
    /// Display name
    #[serde(default)]
    pub client_name: Option<String>,
    /// Registered redirect URIs, matched exactly
    #[serde(default)]
    pub redirect_urls: Vec<String>,
    /// Scopes the client may request
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Grants the client may use
    #[serde(default)]
    pub grants: Vec<GrantType>,
    /// Resource servers added to the audience of embedded access tokens
    #[serde(default)]
    pub allowed_resource_servers: Vec<String>,
    #[serde(default)]
    pub resource_server: bool,
    #[serde(default)]
    pub public_client: bool,
    /// Access token lifetime in seconds
    #[serde(default = "default_token_validity")]
    pub access_token_validity: i64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_token_validity")]
    pub refresh_token_validity: i64,
    /// PEM encoded RSA public key verifying signed request objects
    #[serde(default)]
    pub signing_certificate: Option<String>,
    /// JWKS location verifying signed request objects
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

impl OpenIDClient {
    pub fn new(
        client_id: &str,
        redirect_urls: Vec<String>,
        scopes: Vec<String>,
        grants: Vec<GrantType>,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_name: None,
            redirect_urls,
            scopes,
            grants,
            allowed_resource_servers: Vec::new(),
            resource_server: false,
            public_client: false,
            access_token_validity: default_token_validity(),
            refresh_token_validity: default_token_validity(),
            signing_certificate: None,
            jwks_uri: None,
        }
    }

    pub fn has_grant(&self, grant: GrantType) -> bool {
        self.grants.contains(&grant)
    }

    pub fn certificate_specified(&self) -> bool {
        self.signing_certificate
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
            || self
                .jwks_uri
                .as_deref()
                .is_some_and(|value| !value.trim().is_empty())
    }
}

/// Authenticated subject as provisioned by the SAML service provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub sub: String,
    /// Client the authentication was performed for
    #[serde(default)]
    pub client_id: Option<String>,
    /// Claim bag released by the identity provider
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    /// Authentication context classes asserted by the identity provider
    #[serde(default)]
    pub acr_claims: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(sub: &str) -> Self {
        Self {
            sub: sub.to_string(),
            client_id: None,
            attributes: serde_json::Map::new(),
            acr_claims: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Single-use authorization code and the request context it was issued for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub sub: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub nonce: Option<String>,
    /// Claims requested for the ID token issued at the token endpoint
    pub id_token_claims: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// Issued access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// The signed JWT handed to the client
    pub value: String,
    /// Signing key the JWT was signed with
    pub signing_key_id: String,
    pub sub: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub client_credentials: bool,
}

/// Issued refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub value: String,
    /// Access token this refresh token was issued alongside
    pub access_token_value: String,
    pub sub: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Classification of a response type into the flow that serves it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// `code`
    Code,
    /// `token`, `id_token` or `id_token token`
    Implicit,
    /// `code` combined with `token` and/or `id_token`
    Hybrid,
}

/// Parsed `response_type` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseType {
    pub code: bool,
    pub token: bool,
    pub id_token: bool,
}

impl ResponseType {
    pub const CODE: ResponseType = ResponseType {
        code: true,
        token: false,
        id_token: false,
    };

    /// Parse a space separated `response_type` value
    pub fn parse(value: &str) -> Result<Self, String> {
        let mut response_type = ResponseType::default();
        let mut seen = 0;
        for part in value.split_whitespace() {
            seen += 1;
            match part {
                "code" => response_type.code = true,
                "token" => response_type.token = true,
                "id_token" => response_type.id_token = true,
                other => return Err(other.to_string()),
            }
        }
        if seen == 0 {
            return Err(value.to_string());
        }
        Ok(response_type)
    }

    /// The flow this response type belongs to, `None` for combinations no flow serves
    pub fn flow(&self) -> Option<Flow> {
        match (self.code, self.token, self.id_token) {
            (true, false, false) => Some(Flow::Code),
            (true, _, _) => Some(Flow::Hybrid),
            (false, true, _) | (false, false, true) => Some(Flow::Implicit),
            (false, false, false) => None,
        }
    }

    pub fn implies_code_flow(&self) -> bool {
        self.flow() == Some(Flow::Code)
    }

    pub fn implies_implicit_flow(&self) -> bool {
        self.flow() == Some(Flow::Implicit)
    }

    pub fn implies_hybrid_flow(&self) -> bool {
        self.flow() == Some(Flow::Hybrid)
    }

    /// `at_hash` is required whenever an access token is returned next to an ID token
    pub fn requires_access_token_hash(&self) -> bool {
        self.id_token && self.token
    }

    /// `c_hash` is required whenever a code is returned next to an ID token
    pub fn requires_code_hash(&self) -> bool {
        self.id_token && self.code
    }

    /// Default response mode for this response type
    pub fn implied_response_mode(&self) -> ResponseMode {
        if self.implies_code_flow() {
            ResponseMode::Query
        } else {
            ResponseMode::Fragment
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [
            (self.code, "code"),
            (self.id_token, "id_token"),
            (self.token, "token"),
        ]
        .into_iter()
        .filter_map(|(present, name)| present.then_some(name))
        .collect();
        f.write_str(&parts.join(" "))
    }
}

/// How authorization response parameters reach the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    Fragment,
    FormPost,
    /// A mode this server recognizes no encoding for
    Other(String),
}

impl ResponseMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "query" => ResponseMode::Query,
            "fragment" => ResponseMode::Fragment,
            "form_post" => ResponseMode::FormPost,
            other => ResponseMode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResponseMode::Query => "query",
            ResponseMode::Fragment => "fragment",
            ResponseMode::FormPost => "form_post",
            ResponseMode::Other(value) => value,
        }
    }
}

/// Parse scope string into an ordered list without duplicates
pub fn parse_scope(scope: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for value in scope.split_whitespace() {
        if !scopes.iter().any(|existing| existing == value) {
            scopes.push(value.to_string());
        }
    }
    scopes
}
