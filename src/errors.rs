//! Standardized error types following the `error-oidcng-<domain>-<number>` format.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-oidcng-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-oidcng-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-oidcng-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-oidcng-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-oidcng-config-5 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when the key encryption root keyset cannot be read or parsed
    #[error("error-oidcng-config-6 Unable to load secret key set '{0}': {1}")]
    SecretKeySetInvalid(String, String),

    /// Error when the OpenID discovery document cannot be read or parsed
    #[error("error-oidcng-config-7 Unable to load OpenID configuration '{0}': {1}")]
    OpenIDConfigurationInvalid(String, String),

    /// Error when a timestamp cannot be parsed
    #[error("error-oidcng-config-8 Failed to parse timestamp '{0}': {1}")]
    TimestampParsingFailed(String, String),
}

/// Key management, signing and sealing errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// JWT could not be parsed or its signature did not verify
    #[error("error-oidcng-token-1 Invalid signature: {0}")]
    InvalidSignature(String),

    /// A previously issued token failed verification
    #[error("error-oidcng-token-2 Tampered token: {0}")]
    TamperedToken(String),

    /// A key id is absent from the cache even after a refresh
    #[error("error-oidcng-token-3 Unknown key id {key_id}, known keys: {known:?}")]
    UnknownKey { key_id: String, known: Vec<String> },

    /// AEAD or RSA primitive failure
    #[error("error-oidcng-token-4 Cryptographic operation failed: {0}")]
    Crypto(String),

    /// Claim or key serialization failure
    #[error("error-oidcng-token-5 Serialization failed: {0}")]
    Serialization(String),

    /// Key generation failure
    #[error("error-oidcng-token-6 Key generation failed: {0}")]
    KeyGeneration(String),

    /// Repository failure while reading or writing key material
    #[error("error-oidcng-token-7 Key storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Authorization endpoint errors
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Response type not permitted by the client's grants
    #[error("error-oidcng-authorize-1 Invalid grant: {0}")]
    InvalidGrant(String),

    /// Requested scope outside the allowed set
    #[error("error-oidcng-authorize-2 Invalid scope: {0}")]
    InvalidScope(String),

    /// Supplied redirect URI not registered for the client
    #[error("error-oidcng-authorize-3 Redirect mismatch: {0}")]
    RedirectMismatch(String),

    /// `prompt` present and not `login`
    #[error("error-oidcng-authorize-4 Unsupported Prompt value: {prompt}")]
    UnsupportedPromptValue {
        prompt: String,
        error_code: &'static str,
    },

    /// Unknown client id
    #[error("error-oidcng-authorize-5 Client not found: {0}")]
    ClientNotFound(String),

    /// Malformed request parameters or request object
    #[error("error-oidcng-authorize-6 Invalid request: {0}")]
    InvalidRequest(String),

    /// Client without any registered redirect URI
    #[error("error-oidcng-authorize-7 Client {0} must have at least one redirectURI configured")]
    NoRedirectUri(String),

    /// Response type without a handling branch
    #[error("error-oidcng-authorize-8 Not yet implemented response_type: {0}")]
    UnsupportedResponseType(String),

    /// Response mode without a handling branch
    #[error("error-oidcng-authorize-9 Response mode {0} not supported")]
    UnsupportedResponseMode(String),

    /// Token issuance failure
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Repository failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthorizationError {
    /// OAuth 2 / OpenID Connect error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthorizationError::InvalidGrant(_) => "invalid_grant",
            AuthorizationError::InvalidScope(_) => "invalid_scope",
            AuthorizationError::RedirectMismatch(_) => "invalid_request",
            AuthorizationError::UnsupportedPromptValue { error_code, .. } => error_code,
            AuthorizationError::ClientNotFound(_) => "unauthorized_client",
            AuthorizationError::InvalidRequest(_) => "invalid_request",
            AuthorizationError::UnsupportedResponseType(_) => "unsupported_response_type",
            AuthorizationError::NoRedirectUri(_)
            | AuthorizationError::UnsupportedResponseMode(_)
            | AuthorizationError::Token(_)
            | AuthorizationError::Storage(_) => "server_error",
        }
    }

    /// HTTP status used when this error is rendered at the boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthorizationError::ClientNotFound(_) => StatusCode::UNAUTHORIZED,
            AuthorizationError::NoRedirectUri(_)
            | AuthorizationError::UnsupportedResponseMode(_)
            | AuthorizationError::Token(_)
            | AuthorizationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-oidcng-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when query execution fails
    #[error("error-oidcng-storage-2 Query execution failed: {0}")]
    QueryFailed(String),

    /// Error when data serialization fails
    #[error("error-oidcng-storage-3 Data serialization failed: {0}")]
    SerializationFailed(String),

    /// Error when database operation fails
    #[error("error-oidcng-storage-4 Database error: {0}")]
    DatabaseError(String),

    /// Error when data validation fails
    #[error("error-oidcng-storage-5 Invalid data: {0}")]
    InvalidData(String),

    /// Error when requested resource is not found
    #[error("error-oidcng-storage-6 Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "authorization failed");
        } else {
            tracing::info!(error = %self, "authorization rejected");
        }
        let body = json!({
            "error": self.error_code(),
            "error_description": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self, "token operation failed");
        let body = json!({
            "error": "server_error",
            "error_description": self.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_error_code_is_carried() {
        let err = AuthorizationError::UnsupportedPromptValue {
            prompt: "none".to_string(),
            error_code: "interaction_required",
        };
        assert_eq!(err.error_code(), "interaction_required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_configuration_errors_are_server_errors() {
        let err = AuthorizationError::UnsupportedResponseMode("web_message".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "server_error");
        assert!(err.to_string().starts_with("error-oidcng-authorize-9"));
    }

    #[test]
    fn test_unknown_key_message_lists_known_keys() {
        let err = TokenError::UnknownKey {
            key_id: "key_missing".to_string(),
            known: vec!["key_a".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("key_missing"));
        assert!(message.contains("key_a"));
    }
}
