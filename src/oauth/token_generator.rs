//! Issuance and consumption of authorization codes, refresh tokens, ID tokens
//! and access tokens with embedded user info.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::TokenError;
use crate::keys::{EncryptedTokenValue, KeyManager};
use crate::oauth::openid::{EMBEDDED_CLAIMS, EMBEDDED_CLAIMS_KEY_ID, OpenIDClaims, negotiate_acr};
use crate::oauth::types::{OpenIDClient, ResponseType, User};

/// Characters an authorization code is drawn from
pub const AUTHORIZATION_CODE_ALPHABET: &[u8] =
    b"1234567890ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of an authorization code
pub const AUTHORIZATION_CODE_LENGTH: usize = 12;

fn embedded_claim<'a>(claims: &'a OpenIDClaims, name: &str) -> Result<&'a str, TokenError> {
    claims
        .additional_claims
        .get(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| TokenError::Serialization(format!("access token has no {} claim", name)))
}

/// Inputs of an ID token returned directly from the authorization endpoint
pub struct AuthorizationEndpointIdToken<'a> {
    pub user: &'a User,
    pub client: &'a OpenIDClient,
    pub nonce: Option<&'a str>,
    pub response_type: ResponseType,
    pub access_token: Option<&'a str>,
    pub claims: &'a [String],
    pub authorization_code: Option<&'a str>,
    pub state: Option<&'a str>,
}

/// Builds and parses token artifacts, delegating key material to the [`KeyManager`]
pub struct TokenGenerator {
    key_manager: Arc<KeyManager>,
    issuer: String,
    acr_values_supported: Vec<String>,
    default_acr_value: String,
    fixed_clock: Option<DateTime<Utc>>,
}

impl TokenGenerator {
    pub fn new(
        key_manager: Arc<KeyManager>,
        issuer: &str,
        acr_values_supported: Vec<String>,
        default_acr_value: &str,
    ) -> Self {
        Self {
            key_manager,
            issuer: issuer.to_string(),
            acr_values_supported,
            default_acr_value: default_acr_value.to_string(),
            fixed_clock: None,
        }
    }

    /// Freeze the clock used for `iat`, `nbf`, `exp` and `auth_time`
    pub fn with_fixed_clock(mut self, fixed_clock: Option<DateTime<Utc>>) -> Self {
        self.fixed_clock = fixed_clock;
        self
    }

    pub fn key_manager(&self) -> &Arc<KeyManager> {
        &self.key_manager
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_clock.unwrap_or_else(Utc::now)
    }

    pub fn generate_authorization_code(&self) -> String {
        let mut rng = rand::rngs::OsRng;
        (0..AUTHORIZATION_CODE_LENGTH)
            .map(|_| {
                AUTHORIZATION_CODE_ALPHABET[rng.gen_range(0..AUTHORIZATION_CODE_ALPHABET.len())]
                    as char
            })
            .collect()
    }

    pub fn generate_refresh_token(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Signed JWT whose `claims` claim holds the sealed user and `claim_key_id` the sealing key
    pub async fn generate_access_token_with_embedded_user_info(
        &self,
        user: &User,
        client: &OpenIDClient,
    ) -> Result<EncryptedTokenValue, TokenError> {
        let json = serde_json::to_vec(user).map_err(|e| TokenError::Serialization(e.to_string()))?;
        let sealed = self.key_manager.encrypt_aead(&json).await?;

        let claims = self
            .id_token(client, None, &[], true)
            .with_claim(EMBEDDED_CLAIMS, serde_json::Value::String(sealed.value))
            .with_claim(
                EMBEDDED_CLAIMS_KEY_ID,
                serde_json::Value::String(sealed.key_id),
            );
        self.key_manager.sign(&claims).await
    }

    /// Verify an access token and recover the user sealed inside it
    pub async fn decrypt_access_token_with_embedded_user_info(
        &self,
        access_token: &str,
    ) -> Result<User, TokenError> {
        let claims: OpenIDClaims =
            self.key_manager
                .verify(access_token)
                .await
                .map_err(|e| match e {
                    TokenError::InvalidSignature(reason) => TokenError::TamperedToken(reason),
                    other => other,
                })?;

        let sealed = embedded_claim(&claims, EMBEDDED_CLAIMS)?;
        let key_id = embedded_claim(&claims, EMBEDDED_CLAIMS_KEY_ID)?;

        let json = self.key_manager.decrypt_aead(sealed, key_id).await?;
        serde_json::from_slice(&json).map_err(|e| TokenError::Serialization(e.to_string()))
    }

    pub async fn generate_id_token_for_authorization_endpoint(
        &self,
        request: AuthorizationEndpointIdToken<'_>,
    ) -> Result<EncryptedTokenValue, TokenError> {
        let mut claims = self
            .id_token(request.client, Some(request.user), request.claims, false)
            .with_auth_time(self.now().timestamp())
            .with_nonce(request.nonce.map(str::to_string));

        if request.response_type.requires_access_token_hash() {
            if let Some(access_token) = request.access_token {
                claims = claims.with_at_hash(access_token);
            }
        }
        if request.response_type.requires_code_hash() {
            if let Some(code) = request.authorization_code {
                claims = claims.with_c_hash(code);
            }
        }
        if let Some(state) = request.state.filter(|state| !state.is_empty()) {
            claims = claims.with_s_hash(state);
        }

        self.key_manager.sign(&claims).await
    }

    pub async fn generate_id_token_for_token_endpoint(
        &self,
        user: Option<&User>,
        client: &OpenIDClient,
        nonce: Option<&str>,
        id_token_claims: &[String],
        auth_time: Option<i64>,
    ) -> Result<EncryptedTokenValue, TokenError> {
        let mut claims = self
            .id_token(client, user, id_token_claims, false)
            .with_nonce(nonce.filter(|nonce| !nonce.is_empty()).map(str::to_string));
        if let Some(auth_time) = auth_time {
            claims = claims.with_auth_time(auth_time);
        }
        self.key_manager.sign(&claims).await
    }

    pub async fn encrypt_aead(&self, plaintext: &str) -> Result<EncryptedTokenValue, TokenError> {
        self.key_manager.encrypt_aead(plaintext.as_bytes()).await
    }

    pub async fn decrypt_aead(&self, sealed: &str, key_id: &str) -> Result<String, TokenError> {
        let plaintext = self.key_manager.decrypt_aead(sealed, key_id).await?;
        String::from_utf8(plaintext).map_err(|e| TokenError::Serialization(e.to_string()))
    }

    fn id_token(
        &self,
        client: &OpenIDClient,
        user: Option<&User>,
        id_token_claims: &[String],
        include_allowed_resource_servers: bool,
    ) -> OpenIDClaims {
        let now = self.now();

        let mut audience = vec![client.client_id.clone()];
        if include_allowed_resource_servers {
            for resource_server in &client.allowed_resource_servers {
                if resource_server != &client.client_id && !audience.contains(resource_server) {
                    audience.push(resource_server.clone());
                }
            }
        }

        let mut claims = OpenIDClaims {
            iss: self.issuer.clone(),
            sub: user.map_or_else(|| client.client_id.clone(), |user| user.sub.clone()),
            aud: audience,
            exp: now.timestamp() + client.access_token_validity,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            ..Default::default()
        };

        if let Some(user) = user {
            for name in id_token_claims {
                if let Some(value) = user.attributes.get(name) {
                    claims = claims.with_claim(name, value.clone());
                }
            }
            claims.acr = Some(negotiate_acr(
                &user.acr_claims,
                &self.acr_values_supported,
                &self.default_acr_value,
            ));
        }

        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::AeadKeyset;
    use crate::oauth::openid::calculate_hash;
    use crate::oauth::types::GrantType;
    use crate::storage::MemoryOAuthStorage;
    use serde_json::{Value, json};

    const SUPPORTED_ACR: &str = "http://test.surfconext.nl/assurance/loa2";
    const DEFAULT_ACR: &str = "http://test.surfconext.nl/assurance/loa1";

    async fn create_token_generator() -> TokenGenerator {
        let storage = Arc::new(MemoryOAuthStorage::new());
        let key_manager = KeyManager::new(AeadKeyset::generate(), "oidcng-test", storage);
        key_manager.initialize().await.unwrap();
        TokenGenerator::new(
            Arc::new(key_manager),
            "https://op.example.com",
            vec![SUPPORTED_ACR.to_string()],
            DEFAULT_ACR,
        )
    }

    fn create_client() -> OpenIDClient {
        let mut client = OpenIDClient::new(
            "c1",
            vec!["https://rp/cb".to_string()],
            vec!["openid".to_string()],
            vec![GrantType::Implicit],
        );
        client.allowed_resource_servers = vec!["c1".to_string(), "rs1".to_string()];
        client.access_token_validity = 900;
        client
    }

    fn create_user() -> User {
        let mut user = User::new("sub1");
        user.attributes
            .insert("email".to_string(), json!("john@example.org"));
        user.attributes.insert(
            "eduperson_affiliation".to_string(),
            json!(["student", "member"]),
        );
        user.acr_claims = vec![SUPPORTED_ACR.to_string(), "urn:unknown".to_string()];
        user
    }

    async fn claims_of(generator: &TokenGenerator, token: &str) -> Value {
        generator.key_manager().verify(token).await.unwrap()
    }

    #[tokio::test]
    async fn test_authorization_code_alphabet() {
        let generator = create_token_generator().await;
        for _ in 0..200 {
            let code = generator.generate_authorization_code();
            assert_eq!(code.len(), AUTHORIZATION_CODE_LENGTH);
            assert!(code.bytes().all(|c| AUTHORIZATION_CODE_ALPHABET.contains(&c)));
        }
        assert_eq!(AUTHORIZATION_CODE_ALPHABET.len(), 62);
        assert_ne!(
            generator.generate_authorization_code(),
            generator.generate_authorization_code()
        );
    }

    #[tokio::test]
    async fn test_refresh_token_is_uuid() {
        let generator = create_token_generator().await;
        let token = generator.generate_refresh_token();
        assert!(Uuid::parse_str(&token).is_ok());
        assert_ne!(token, generator.generate_refresh_token());
    }

    #[tokio::test]
    async fn test_access_token_round_trip() {
        let generator = create_token_generator().await;
        let user = create_user();
        let client = create_client();

        let token = generator
            .generate_access_token_with_embedded_user_info(&user, &client)
            .await
            .unwrap();

        let decrypted = generator
            .decrypt_access_token_with_embedded_user_info(&token.value)
            .await
            .unwrap();
        assert_eq!(decrypted, user);

        let public_keys = generator.key_manager().public_keys().await.unwrap();
        assert!(public_keys.iter().any(|jwk| jwk.kid == token.key_id));
    }

    #[tokio::test]
    async fn test_access_token_claims() {
        let generator = create_token_generator().await;
        let client = create_client();

        let token = generator
            .generate_access_token_with_embedded_user_info(&create_user(), &client)
            .await
            .unwrap();
        let claims = claims_of(&generator, &token.value).await;

        assert_eq!(claims["iss"], "https://op.example.com");
        assert_eq!(claims["sub"], "c1");
        assert_eq!(claims["aud"], json!(["c1", "rs1"]));
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            900
        );
        assert!(claims["jti"].as_str().is_some());
        assert!(claims[EMBEDDED_CLAIMS].as_str().is_some());
        assert!(claims[EMBEDDED_CLAIMS_KEY_ID].as_str().is_some());
        assert!(claims.get("email").is_none());
        assert!(claims.get("acr").is_none());
    }

    #[tokio::test]
    async fn test_tampered_access_token() {
        let generator = create_token_generator().await;
        let token = generator
            .generate_access_token_with_embedded_user_info(&create_user(), &create_client())
            .await
            .unwrap();

        let mut parts: Vec<String> = token.value.split('.').map(str::to_string).collect();
        let mut signature = parts[2].clone().into_bytes();
        signature[10] = if signature[10] == b'A' { b'B' } else { b'A' };
        parts[2] = String::from_utf8(signature).unwrap();

        let result = generator
            .decrypt_access_token_with_embedded_user_info(&parts.join("."))
            .await;
        assert!(matches!(result, Err(TokenError::TamperedToken(_))));
    }

    #[tokio::test]
    async fn test_id_token_for_implicit_flow() {
        let generator = create_token_generator().await;
        let user = create_user();
        let client = create_client();
        let requested = vec!["email".to_string(), "nickname".to_string()];

        let token = generator
            .generate_id_token_for_authorization_endpoint(AuthorizationEndpointIdToken {
                user: &user,
                client: &client,
                nonce: Some("nonce"),
                response_type: ResponseType::parse("id_token token").unwrap(),
                access_token: Some("access"),
                claims: &requested,
                authorization_code: None,
                state: Some("xyz"),
            })
            .await
            .unwrap();
        let claims = claims_of(&generator, &token.value).await;

        assert_eq!(claims["sub"], "sub1");
        assert_eq!(claims["aud"], json!(["c1"]));
        assert_eq!(claims["nonce"], "nonce");
        assert_eq!(claims["at_hash"], calculate_hash("access"));
        assert_eq!(claims["s_hash"], calculate_hash("xyz"));
        assert_eq!(claims["email"], "john@example.org");
        assert_eq!(claims["acr"], SUPPORTED_ACR);
        assert!(claims["auth_time"].as_i64().is_some());
        assert!(claims.get("c_hash").is_none());
        assert!(claims.get("nickname").is_none());
        assert!(claims.get("eduperson_affiliation").is_none());
    }

    #[tokio::test]
    async fn test_id_token_for_hybrid_flow() {
        let generator = create_token_generator().await;
        let mut user = create_user();
        user.acr_claims.clear();
        let client = create_client();

        let token = generator
            .generate_id_token_for_authorization_endpoint(AuthorizationEndpointIdToken {
                user: &user,
                client: &client,
                nonce: None,
                response_type: ResponseType::parse("code id_token").unwrap(),
                access_token: None,
                claims: &[],
                authorization_code: Some("code123"),
                state: Some(""),
            })
            .await
            .unwrap();
        let claims = claims_of(&generator, &token.value).await;

        assert_eq!(claims["c_hash"], calculate_hash("code123"));
        assert_eq!(claims["acr"], DEFAULT_ACR);
        assert!(claims.get("at_hash").is_none());
        assert!(claims.get("s_hash").is_none());
        assert!(claims.get("nonce").is_none());
    }

    #[tokio::test]
    async fn test_id_token_for_token_endpoint() {
        let generator = create_token_generator().await;
        let user = create_user();
        let client = create_client();

        let token = generator
            .generate_id_token_for_token_endpoint(
                Some(&user),
                &client,
                Some(""),
                &["email".to_string()],
                None,
            )
            .await
            .unwrap();
        let claims = claims_of(&generator, &token.value).await;

        assert_eq!(claims["email"], "john@example.org");
        assert!(claims.get("auth_time").is_none());
        assert!(claims.get("nonce").is_none());

        let token = generator
            .generate_id_token_for_token_endpoint(None, &client, Some("n"), &[], Some(42))
            .await
            .unwrap();
        let claims = claims_of(&generator, &token.value).await;

        assert_eq!(claims["sub"], "c1");
        assert_eq!(claims["auth_time"], 42);
        assert_eq!(claims["nonce"], "n");
        assert!(claims.get("acr").is_none());
    }

    #[tokio::test]
    async fn test_fixed_clock() {
        let instant = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let generator = create_token_generator()
            .await
            .with_fixed_clock(Some(instant));

        let token = generator
            .generate_id_token_for_token_endpoint(None, &create_client(), None, &[], None)
            .await
            .unwrap();
        let claims = claims_of(&generator, &token.value).await;

        assert_eq!(claims["iat"], instant.timestamp());
        assert_eq!(claims["nbf"], instant.timestamp());
        assert_eq!(claims["exp"], instant.timestamp() + 900);
    }

    #[tokio::test]
    async fn test_aead_helpers() {
        let generator = create_token_generator().await;
        let sealed = generator.encrypt_aead("secret").await.unwrap();
        assert_eq!(
            generator
                .decrypt_aead(&sealed.value, &sealed.key_id)
                .await
                .unwrap(),
            "secret"
        );
    }
}
