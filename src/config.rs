//! Environment-based configuration types for the oidcng server runtime settings.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::keys::aead::AeadKeyset;

/// ACR value asserted when none of a user's ACR claims are supported
pub const DEFAULT_ACR_VALUE: &str = "http://refeds.org/assurance";

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// Lifetime of a freshly issued authorization code
#[derive(Clone)]
pub struct AuthorizationCodeExpiration(chrono::Duration);

/// Interval between housekeeping runs
#[derive(Clone)]
pub struct CleanerInterval(Duration);

/// Age after which provisioned users are removed by the cleaner
#[derive(Clone)]
pub struct UserRetention(chrono::Duration);

/// Feature toggle parsed from true/false/1/0/yes/no/on/off
#[derive(Clone, Copy)]
pub struct Toggle(bool);

/// Optional frozen clock used by the token generator
#[derive(Clone, Default)]
pub struct FixedClock(Option<DateTime<Utc>>);

/// Subset of the OpenID discovery document the server consumes
#[derive(Clone, Debug, Deserialize)]
pub struct OpenIDConfiguration {
    pub issuer: String,
    #[serde(default)]
    pub acr_values_supported: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub issuer: String,
    pub http_port: HttpPort,
    pub http_templates_path: String,
    pub secret_key_set_path: String,
    pub associated_data: String,
    pub openid_configuration: OpenIDConfiguration,
    pub default_acr_value: String,
    pub authorization_code_expiration: AuthorizationCodeExpiration,
    pub authenticated_user_header: String,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub cleaner_enabled: Toggle,
    pub cleaner_interval: CleanerInterval,
    pub user_retention: UserRetention,
    pub fixed_clock: FixedClock,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let issuer = require_env("ISSUER")?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let http_templates_path = optional_env("HTTP_TEMPLATES_PATH")
            .unwrap_or_else(|| format!("{}/templates", env!("CARGO_MANIFEST_DIR")));
        let secret_key_set_path = require_env("SECRET_KEY_SET_PATH")?;
        let associated_data = require_env("ASSOCIATED_DATA")?;
        let openid_configuration = match optional_env("OPENID_CONFIGURATION_PATH") {
            Some(path) => OpenIDConfiguration::load(&path)?,
            None => OpenIDConfiguration::built_in(&issuer),
        };
        let default_acr_value = default_env("DEFAULT_ACR_VALUE", DEFAULT_ACR_VALUE);
        let authorization_code_expiration: AuthorizationCodeExpiration =
            default_env("AUTHORIZATION_CODE_EXPIRATION", "10m").try_into()?;
        let authenticated_user_header =
            default_env("AUTHENTICATED_USER_HEADER", "x-authenticated-sub").to_lowercase();
        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let cleaner_enabled: Toggle = default_env("CLEANER_ENABLED", "false").try_into()?;
        let cleaner_interval: CleanerInterval = default_env("CLEANER_INTERVAL", "5m").try_into()?;
        let user_retention: UserRetention = default_env("USER_RETENTION", "1d").try_into()?;
        let fixed_clock: FixedClock = optional_env("FIXED_CLOCK").try_into()?;

        Ok(Self {
            version: version()?,
            issuer,
            http_port,
            http_templates_path,
            secret_key_set_path,
            associated_data,
            openid_configuration,
            default_acr_value,
            authorization_code_expiration,
            authenticated_user_header,
            storage_backend,
            database_url,
            cleaner_enabled,
            cleaner_interval,
            user_retention,
            fixed_clock,
        })
    }

    /// Read and parse the key encryption root keyset file
    pub fn load_secret_key_set(&self) -> Result<AeadKeyset> {
        load_secret_key_set(&self.secret_key_set_path)
    }
}

/// Read and parse a key encryption root keyset file
pub fn load_secret_key_set(path: &str) -> Result<AeadKeyset> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::SecretKeySetInvalid(path.to_string(), e.to_string()))?;
    AeadKeyset::from_json(&contents)
        .map_err(|e| ConfigError::SecretKeySetInvalid(path.to_string(), e.to_string()).into())
}

impl OpenIDConfiguration {
    /// Load a discovery document from disk
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::OpenIDConfigurationInvalid(path.to_string(), e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| {
            ConfigError::OpenIDConfigurationInvalid(path.to_string(), e.to_string()).into()
        })
    }

    /// Discovery document derived from the issuer alone
    pub fn built_in(issuer: &str) -> Self {
        let issuer = issuer.trim_end_matches('/').to_string();
        let document = serde_json::json!({
            "authorization_endpoint": format!("{}/oidc/authorize", issuer),
            "jwks_uri": format!("{}/oidc/certs", issuer),
            "response_types_supported": [
                "code",
                "token",
                "id_token",
                "id_token token",
                "code id_token",
                "code token",
                "code id_token token"
            ],
            "response_modes_supported": ["query", "fragment", "form_post"],
            "grant_types_supported": ["authorization_code", "implicit", "refresh_token"],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": ["RS256"],
            "scopes_supported": ["openid", "profile", "email", "address", "phone"],
            "claims_parameter_supported": true,
            "request_parameter_supported": true,
            "request_uri_parameter_supported": true,
        });
        let extra = match document {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            issuer,
            acr_values_supported: vec![DEFAULT_ACR_VALUE.to_string()],
            extra,
        }
    }

    /// Full document as served from the well-known endpoint
    pub fn to_json(&self) -> serde_json::Value {
        let mut document = self.extra.clone();
        document.insert(
            "issuer".to_string(),
            serde_json::Value::String(self.issuer.clone()),
        );
        document.insert(
            "acr_values_supported".to_string(),
            serde_json::Value::from(self.acr_values_supported.clone()),
        );
        serde_json::Value::Object(document)
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for AuthorizationCodeExpiration {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(chrono::Duration::from_std(duration)?))
    }
}

impl AsRef<chrono::Duration> for AuthorizationCodeExpiration {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for CleanerInterval {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for CleanerInterval {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for UserRetention {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(chrono::Duration::from_std(duration)?))
    }
}

impl AsRef<chrono::Duration> for UserRetention {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for Toggle {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" => Ok(Self(false)),
            _ => Err(ConfigError::BoolParsingFailed(value).into()),
        }
    }
}

impl AsRef<bool> for Toggle {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}

impl TryFrom<Option<String>> for FixedClock {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value {
            None => Ok(Self(None)),
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .map(|instant| Self(Some(instant.with_timezone(&Utc))))
                .map_err(|e| ConfigError::TimestampParsingFailed(value, e.to_string()).into()),
        }
    }
}

impl AsRef<Option<DateTime<Utc>>> for FixedClock {
    fn as_ref(&self) -> &Option<DateTime<Utc>> {
        &self.0
    }
}
