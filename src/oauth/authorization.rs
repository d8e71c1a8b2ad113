//! The `/oidc/authorize` state machine: client resolution, request validation
//! and the code, implicit and hybrid response branches.

use chrono::{Duration, Utc};
use std::sync::Arc;
use url::Url;

use crate::errors::AuthorizationError;
use crate::oauth::request::{
    AuthorizationRequest, AuthorizeQuery, RequestObjectResolver, validate_prompt,
};
use crate::oauth::token_generator::{AuthorizationEndpointIdToken, TokenGenerator};
use crate::oauth::types::{
    AccessToken, AuthorizationCode, FREE_SCOPES, Flow, GrantType, OPENID_SCOPE, OpenIDClient,
    ResponseMode, ResponseType, User,
};
use crate::storage::traits::OAuthStorage;

/// Outcome of a successful authorization request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizationResponse {
    /// Redirect to the client carrying the response in the query or fragment
    Redirect(String),
    /// Auto-submitting form posting `parameters` to `redirect_uri`
    FormPost {
        redirect_uri: String,
        parameters: Vec<(String, String)>,
    },
}

pub struct AuthorizationEndpoint {
    storage: Arc<dyn OAuthStorage>,
    token_generator: Arc<TokenGenerator>,
    request_objects: RequestObjectResolver,
    authorization_code_expiration: Duration,
}

impl AuthorizationEndpoint {
    pub fn new(
        storage: Arc<dyn OAuthStorage>,
        token_generator: Arc<TokenGenerator>,
        http_client: reqwest::Client,
        authorization_code_expiration: Duration,
    ) -> Self {
        Self {
            storage,
            token_generator,
            request_objects: RequestObjectResolver::new(http_client),
            authorization_code_expiration,
        }
    }

    /// Handle an authorization request for an already authenticated `user`
    pub async fn authorize(
        &self,
        query: AuthorizeQuery,
        user: User,
    ) -> Result<AuthorizationResponse, AuthorizationError> {
        validate_prompt(query.prompt.as_deref())?;

        let mut request = AuthorizationRequest::parse(query.clone())?;

        let client = self
            .storage
            .get_client(&request.client_id)
            .await?
            .ok_or_else(|| AuthorizationError::ClientNotFound(request.client_id.clone()))?;

        if request.is_openid_request() && request.specifies_request_object() {
            let expanded = self.request_objects.expand(query, &client).await?;
            validate_prompt(expanded.prompt.as_deref())?;
            request = AuthorizationRequest::parse(expanded)?;
        }

        let redirect_uri = validate_redirect_uri(request.redirect_uri.as_deref(), &client)?;
        let scopes = validate_scopes(&request.scopes, &client)?;
        let response_type = validate_grant_type(request.response_type, &client)?;
        let response_mode = request.response_mode();

        if let ResponseMode::Other(mode) = &response_mode {
            return Err(AuthorizationError::UnsupportedResponseMode(mode.clone()));
        }

        match response_type.flow() {
            Some(Flow::Code) => {
                let authorization_code = self
                    .create_authorization_code(&request, &client, &user, &scopes, &redirect_uri)
                    .await?;
                tracing::info!(
                    client_id = %client.client_id,
                    response_mode = %response_mode.as_str(),
                    redirect_uri = %redirect_uri,
                    "returning authorization code flow"
                );

                let state = request.state.as_deref().filter(|state| !state.is_empty());
                if response_mode == ResponseMode::FormPost {
                    let mut parameters = vec![
                        ("redirect_uri".to_string(), redirect_uri.clone()),
                        ("code".to_string(), authorization_code.code),
                    ];
                    if let Some(state) = state {
                        parameters.push(("state".to_string(), state.to_string()));
                    }
                    return Ok(AuthorizationResponse::FormPost {
                        redirect_uri,
                        parameters,
                    });
                }

                let mut parameters = vec![("code".to_string(), authorization_code.code)];
                if let Some(state) = state {
                    parameters.push(("state".to_string(), state.to_string()));
                }
                encode_redirect(&redirect_uri, &response_mode, &parameters)
            }
            Some(flow @ (Flow::Implicit | Flow::Hybrid)) => {
                if flow == Flow::Implicit {
                    // The user now only lives inside the encrypted access token
                    self.storage.delete_user(&user.sub).await?;
                }

                let parameters = self
                    .implicit_parameters(&request, &client, &user, &scopes, &redirect_uri, response_type)
                    .await?;
                tracing::info!(
                    client_id = %client.client_id,
                    response_type = %response_type,
                    response_mode = %response_mode.as_str(),
                    redirect_uri = %redirect_uri,
                    "returning implicit flow"
                );

                if response_mode == ResponseMode::FormPost {
                    let mut form = vec![("redirect_uri".to_string(), redirect_uri.clone())];
                    form.extend(parameters);
                    return Ok(AuthorizationResponse::FormPost {
                        redirect_uri,
                        parameters: form,
                    });
                }
                encode_redirect(&redirect_uri, &response_mode, &parameters)
            }
            None => Err(AuthorizationError::UnsupportedResponseType(
                response_type.to_string(),
            )),
        }
    }

    async fn create_authorization_code(
        &self,
        request: &AuthorizationRequest,
        client: &OpenIDClient,
        user: &User,
        scopes: &[String],
        redirect_uri: &str,
    ) -> Result<AuthorizationCode, AuthorizationError> {
        let now = Utc::now();
        let authorization_code = AuthorizationCode {
            code: self.token_generator.generate_authorization_code(),
            sub: user.sub.clone(),
            client_id: client.client_id.clone(),
            scopes: scopes.to_vec(),
            redirect_uri: redirect_uri.to_string(),
            nonce: request.nonce.clone(),
            id_token_claims: request.claims.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
            created_at: now,
            expires_at: now + self.authorization_code_expiration,
            used: false,
        };
        self.storage.store_code(&authorization_code).await?;
        Ok(authorization_code)
    }

    /// Ordered response parameters of the implicit and hybrid flows
    async fn implicit_parameters(
        &self,
        request: &AuthorizationRequest,
        client: &OpenIDClient,
        user: &User,
        scopes: &[String],
        redirect_uri: &str,
        response_type: ResponseType,
    ) -> Result<Vec<(String, String)>, AuthorizationError> {
        let mut parameters: Vec<(String, String)> = Vec::new();
        let is_openid_request = request.is_openid_request();

        let mut access_token_value = None;
        if response_type.token || !is_openid_request {
            let access_token = self
                .token_generator
                .generate_access_token_with_embedded_user_info(user, client)
                .await?;
            let now = Utc::now();
            self.storage
                .store_access_token(&AccessToken {
                    value: access_token.value.clone(),
                    signing_key_id: access_token.key_id,
                    sub: user.sub.clone(),
                    client_id: client.client_id.clone(),
                    scopes: scopes.to_vec(),
                    created_at: now,
                    expires_at: now + Duration::seconds(client.access_token_validity),
                    client_credentials: false,
                })
                .await?;
            parameters.push(("access_token".to_string(), access_token.value.clone()));
            parameters.push(("token_type".to_string(), "Bearer".to_string()));
            access_token_value = Some(access_token.value);
        }

        let mut code = None;
        if response_type.code {
            let authorization_code = self
                .create_authorization_code(request, client, user, scopes, redirect_uri)
                .await?;
            parameters.push(("code".to_string(), authorization_code.code.clone()));
            code = Some(authorization_code.code);
        }

        let openid_scoped = scopes.iter().any(|scope| scope == OPENID_SCOPE);
        if response_type.id_token && openid_scoped && is_openid_request {
            let id_token = self
                .token_generator
                .generate_id_token_for_authorization_endpoint(AuthorizationEndpointIdToken {
                    user,
                    client,
                    nonce: request.nonce.as_deref(),
                    response_type,
                    access_token: access_token_value.as_deref(),
                    claims: &request.claims,
                    authorization_code: code.as_deref(),
                    state: request.state.as_deref(),
                })
                .await?;
            parameters.push(("id_token".to_string(), id_token.value));
        }

        parameters.push((
            "expires_in".to_string(),
            client.access_token_validity.to_string(),
        ));
        if let Some(state) = &request.state {
            parameters.push(("state".to_string(), state.clone()));
        }
        Ok(parameters)
    }
}

/// Resolve the redirect URI a response is sent to.
///
/// Without a requested URI the client's first registered one is used. A
/// requested URI must, URL-decoded, equal one of the registered URIs.
pub fn validate_redirect_uri(
    requested: Option<&str>,
    client: &OpenIDClient,
) -> Result<String, AuthorizationError> {
    let Some(requested) = requested else {
        return client
            .redirect_urls
            .first()
            .cloned()
            .ok_or_else(|| AuthorizationError::NoRedirectUri(client.client_id.clone()));
    };

    let decoded = urlencoding::decode(requested)
        .map_err(|e| AuthorizationError::InvalidRequest(format!("Invalid redirect_uri: {}", e)))?
        .into_owned();

    if client.redirect_urls.contains(&decoded) {
        Ok(decoded)
    } else {
        Err(AuthorizationError::RedirectMismatch(format!(
            "Client {} with registered redirect URI's {:?} requested authorization with redirectURI {}",
            client.client_id, client.redirect_urls, decoded
        )))
    }
}

/// Requested scopes must be allowed for the client or be free profile scopes
pub fn validate_scopes(
    requested: &[String],
    client: &OpenIDClient,
) -> Result<Vec<String>, AuthorizationError> {
    let missing: Vec<&str> = requested
        .iter()
        .filter(|scope| {
            !client.scopes.contains(scope) && !FREE_SCOPES.contains(&scope.as_str())
        })
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(requested.to_vec())
    } else {
        Err(AuthorizationError::InvalidScope(format!(
            "Scope(s) {:?} are not allowed for {}. Allowed scopes: {:?}",
            missing, client.client_id, client.scopes
        )))
    }
}

/// The client's grants must permit the flow implied by the response type
pub fn validate_grant_type(
    response_type: ResponseType,
    client: &OpenIDClient,
) -> Result<ResponseType, AuthorizationError> {
    let grants: Vec<&str> = client.grants.iter().map(GrantType::as_str).collect();
    if (response_type.implies_implicit_flow() || response_type.implies_hybrid_flow())
        && !client.has_grant(GrantType::Implicit)
    {
        return Err(AuthorizationError::InvalidGrant(format!(
            "Grant types {:?} does not allow for implicit / hybrid flow",
            grants
        )));
    }
    if response_type.implies_code_flow() && !client.has_grant(GrantType::AuthorizationCode) {
        return Err(AuthorizationError::InvalidGrant(format!(
            "Grant types {:?} does not allow for authorization code flow",
            grants
        )));
    }
    Ok(response_type)
}

/// Append `parameters` to the redirect URI as query parameters or as an
/// unencoded `key=value&...` fragment
fn encode_redirect(
    redirect_uri: &str,
    response_mode: &ResponseMode,
    parameters: &[(String, String)],
) -> Result<AuthorizationResponse, AuthorizationError> {
    let mut url = Url::parse(redirect_uri).map_err(|e| {
        AuthorizationError::InvalidRequest(format!("Invalid redirect URI {}: {}", redirect_uri, e))
    })?;

    match response_mode {
        ResponseMode::Query => {
            {
                let mut query = url.query_pairs_mut();
                for (name, value) in parameters {
                    query.append_pair(name, value);
                }
            }
            Ok(AuthorizationResponse::Redirect(url.to_string()))
        }
        ResponseMode::Fragment => {
            let fragment = parameters
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("&");
            url.set_fragment(None);
            Ok(AuthorizationResponse::Redirect(format!("{}#{}", url, fragment)))
        }
        other => Err(AuthorizationError::UnsupportedResponseMode(
            other.as_str().to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{AeadKeyset, KeyManager};
    use crate::storage::MemoryOAuthStorage;
    use crate::storage::traits::{
        AccessTokenStore, AuthorizationCodeStore, OpenIDClientStore, UserStore,
    };

    fn client(grants: Vec<GrantType>) -> OpenIDClient {
        OpenIDClient::new(
            "c1",
            vec!["https://rp/cb".to_string(), "https://rp/other".to_string()],
            vec!["openid".to_string(), "groups".to_string()],
            grants,
        )
    }

    fn query(pairs: &[(&str, &str)]) -> AuthorizeQuery {
        let map: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    async fn endpoint(
        client: OpenIDClient,
    ) -> (AuthorizationEndpoint, Arc<MemoryOAuthStorage>, Arc<TokenGenerator>, User) {
        let storage = Arc::new(MemoryOAuthStorage::new());
        let key_manager = KeyManager::new(AeadKeyset::generate(), "oidcng-test", storage.clone());
        key_manager.initialize().await.unwrap();
        let token_generator = Arc::new(TokenGenerator::new(
            Arc::new(key_manager),
            "https://op.example.com",
            vec![],
            "http://refeds.org/assurance",
        ));
        storage.store_client(&client).await.unwrap();

        let mut user = User::new("u1");
        user.attributes
            .insert("email".to_string(), serde_json::json!("u1@example.com"));
        storage.store_user(&user).await.unwrap();

        let endpoint = AuthorizationEndpoint::new(
            storage.clone(),
            token_generator.clone(),
            reqwest::Client::new(),
            Duration::minutes(10),
        );
        (endpoint, storage, token_generator, user)
    }

    fn redirect(response: AuthorizationResponse) -> String {
        match response {
            AuthorizationResponse::Redirect(location) => location,
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[test]
    fn test_redirect_uri_fallback_and_mismatch() {
        let client = client(vec![GrantType::AuthorizationCode]);
        assert_eq!(validate_redirect_uri(None, &client).unwrap(), "https://rp/cb");
        assert_eq!(
            validate_redirect_uri(Some("https%3A%2F%2Frp%2Fother"), &client).unwrap(),
            "https://rp/other"
        );
        assert!(matches!(
            validate_redirect_uri(Some("https://evil/cb"), &client),
            Err(AuthorizationError::RedirectMismatch(_))
        ));
        assert!(matches!(
            validate_redirect_uri(Some("https://rp/cb/"), &client),
            Err(AuthorizationError::RedirectMismatch(_))
        ));

        let mut unregistered = client.clone();
        unregistered.redirect_urls.clear();
        assert!(matches!(
            validate_redirect_uri(None, &unregistered),
            Err(AuthorizationError::NoRedirectUri(_))
        ));
        assert!(matches!(
            validate_redirect_uri(Some("https://rp/cb"), &unregistered),
            Err(AuthorizationError::RedirectMismatch(_))
        ));
    }

    #[test]
    fn test_validate_scopes() {
        let client = client(vec![GrantType::AuthorizationCode]);
        let requested: Vec<String> = ["openid", "email", "phone", "groups"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(validate_scopes(&requested, &client).unwrap(), requested);
        assert!(validate_scopes(&[], &client).unwrap().is_empty());

        let error = validate_scopes(
            &["openid".to_string(), "admin".to_string()],
            &client,
        )
        .unwrap_err();
        assert!(matches!(error, AuthorizationError::InvalidScope(_)));
        assert!(error.to_string().contains("[\"admin\"]"));
    }

    #[test]
    fn test_validate_grant_type() {
        let code_only = client(vec![GrantType::AuthorizationCode]);
        let implicit_only = client(vec![GrantType::Implicit]);
        let token = ResponseType::parse("id_token token").unwrap();
        let hybrid = ResponseType::parse("code id_token").unwrap();

        assert!(validate_grant_type(ResponseType::CODE, &code_only).is_ok());
        assert!(matches!(
            validate_grant_type(token, &code_only),
            Err(AuthorizationError::InvalidGrant(_))
        ));
        assert!(matches!(
            validate_grant_type(hybrid, &code_only),
            Err(AuthorizationError::InvalidGrant(_))
        ));
        assert!(validate_grant_type(token, &implicit_only).is_ok());
        assert!(matches!(
            validate_grant_type(ResponseType::CODE, &implicit_only),
            Err(AuthorizationError::InvalidGrant(_))
        ));
    }

    #[tokio::test]
    async fn test_code_flow_query_redirect() {
        let (endpoint, storage, _, user) = endpoint(client(vec![GrantType::AuthorizationCode])).await;

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("scope", "openid"),
                    ("state", "xyz"),
                    ("redirect_uri", "https://rp/cb"),
                ]),
                user,
            )
            .await
            .unwrap();

        let location = redirect(response);
        let url = Url::parse(&location).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(location.starts_with("https://rp/cb?code="));
        assert_eq!(pairs[0].0, "code");
        assert_eq!(pairs[0].1.len(), 12);
        assert_eq!(pairs[1], ("state".to_string(), "xyz".to_string()));

        let stored = storage.find_code(&pairs[0].1).await.unwrap().unwrap();
        assert_eq!(stored.sub, "u1");
        assert_eq!(stored.client_id, "c1");
        assert_eq!(stored.scopes, vec!["openid"]);
        assert_eq!(stored.redirect_uri, "https://rp/cb");
        assert!(!stored.used);
        assert!(stored.expires_at > stored.created_at);

        // The user is kept for the token endpoint
        assert!(storage.find_user("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_code_flow_fragment_and_form_post() {
        let (endpoint, _, _, user) = endpoint(client(vec![GrantType::AuthorizationCode])).await;

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("response_mode", "fragment"),
                ]),
                user.clone(),
            )
            .await
            .unwrap();
        let location = redirect(response);
        assert!(location.starts_with("https://rp/cb#code="));
        assert!(!location.contains("state"));

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("response_mode", "form_post"),
                    ("state", "s1"),
                ]),
                user,
            )
            .await
            .unwrap();
        match response {
            AuthorizationResponse::FormPost {
                redirect_uri,
                parameters,
            } => {
                assert_eq!(redirect_uri, "https://rp/cb");
                let names: Vec<&str> = parameters.iter().map(|(name, _)| name.as_str()).collect();
                assert_eq!(names, vec!["redirect_uri", "code", "state"]);
            }
            other => panic!("expected form post, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_implicit_flow_fragment() {
        let (endpoint, storage, token_generator, user) =
            endpoint(client(vec![GrantType::Implicit])).await;

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "id_token token"),
                    ("client_id", "c1"),
                    ("scope", "openid email"),
                    ("nonce", "n1"),
                    ("claims", r#"{"id_token":{"email":null}}"#),
                ]),
                user.clone(),
            )
            .await
            .unwrap();

        let location = redirect(response);
        let (base, fragment) = location.split_once('#').unwrap();
        assert_eq!(base, "https://rp/cb");

        let parameters: Vec<(&str, &str)> = fragment
            .split('&')
            .map(|pair| pair.split_once('=').unwrap())
            .collect();
        let names: Vec<&str> = parameters.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["access_token", "token_type", "id_token", "expires_in"]);
        assert_eq!(parameters[1].1, "Bearer");
        assert_eq!(parameters[3].1, "3600");

        // The user lives on only inside the access token
        assert!(storage.find_user("u1").await.unwrap().is_none());
        let access_token = parameters[0].1;
        assert!(storage.find_access_token(access_token).await.unwrap().is_some());
        let embedded = token_generator
            .decrypt_access_token_with_embedded_user_info(access_token)
            .await
            .unwrap();
        assert_eq!(embedded, user);

        let id_token: crate::oauth::openid::OpenIDClaims = token_generator
            .key_manager()
            .verify(parameters[2].1)
            .await
            .unwrap();
        assert_eq!(id_token.sub, "u1");
        assert_eq!(id_token.nonce.as_deref(), Some("n1"));
        assert_eq!(
            id_token.at_hash.as_deref(),
            Some(crate::oauth::openid::calculate_hash(access_token).as_str())
        );
        assert_eq!(id_token.additional_claims["email"], "u1@example.com");
    }

    #[tokio::test]
    async fn test_implicit_flow_form_post() {
        let (endpoint, storage, _, user) = endpoint(client(vec![GrantType::Implicit])).await;

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "id_token token"),
                    ("client_id", "c1"),
                    ("scope", "openid"),
                    ("nonce", "n1"),
                    ("response_mode", "form_post"),
                    ("state", "s"),
                ]),
                user,
            )
            .await
            .unwrap();

        match response {
            AuthorizationResponse::FormPost {
                redirect_uri,
                parameters,
            } => {
                assert_eq!(redirect_uri, "https://rp/cb");
                let names: Vec<&str> = parameters.iter().map(|(name, _)| name.as_str()).collect();
                assert_eq!(
                    names,
                    vec!["redirect_uri", "access_token", "token_type", "id_token", "expires_in", "state"]
                );
                assert_eq!(parameters[0].1, "https://rp/cb");
                assert_eq!(parameters[2].1, "Bearer");
                assert_eq!(parameters[5].1, "s");
                assert!(storage.find_access_token(&parameters[1].1).await.unwrap().is_some());
            }
            other => panic!("expected form post, got {:?}", other),
        }

        assert!(storage.find_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hybrid_flow_keeps_user() {
        let (endpoint, storage, token_generator, user) = endpoint(client(vec![
            GrantType::AuthorizationCode,
            GrantType::Implicit,
        ]))
        .await;

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "code id_token"),
                    ("client_id", "c1"),
                    ("scope", "openid"),
                    ("state", "st"),
                ]),
                user,
            )
            .await
            .unwrap();

        let location = redirect(response);
        let fragment = location.split_once('#').unwrap().1;
        let parameters: Vec<(&str, &str)> = fragment
            .split('&')
            .map(|pair| pair.split_once('=').unwrap())
            .collect();
        let names: Vec<&str> = parameters.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["code", "id_token", "expires_in", "state"]);

        assert!(storage.find_user("u1").await.unwrap().is_some());
        assert!(storage.find_code(parameters[0].1).await.unwrap().is_some());

        let id_token: crate::oauth::openid::OpenIDClaims = token_generator
            .key_manager()
            .verify(parameters[1].1)
            .await
            .unwrap();
        assert_eq!(
            id_token.c_hash.as_deref(),
            Some(crate::oauth::openid::calculate_hash(parameters[0].1).as_str())
        );
        assert!(id_token.s_hash.is_some());
        assert!(id_token.at_hash.is_none());
    }

    #[tokio::test]
    async fn test_non_openid_implicit_returns_access_token() {
        let (endpoint, _, _, user) = endpoint(client(vec![GrantType::Implicit])).await;

        let response = endpoint
            .authorize(
                query(&[
                    ("response_type", "token"),
                    ("client_id", "c1"),
                    ("scope", "groups"),
                    ("response_mode", "query"),
                ]),
                user,
            )
            .await
            .unwrap();

        let url = Url::parse(&redirect(response)).unwrap();
        let names: Vec<String> = url.query_pairs().map(|(name, _)| name.into_owned()).collect();
        assert_eq!(names, vec!["access_token", "token_type", "expires_in"]);
    }

    #[tokio::test]
    async fn test_authorize_errors() {
        let (endpoint, _, _, user) = endpoint(client(vec![GrantType::AuthorizationCode])).await;

        let cases: Vec<(Vec<(&str, &str)>, &str)> = vec![
            (
                vec![("response_type", "code"), ("client_id", "unknown")],
                "unauthorized_client",
            ),
            (
                vec![
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("redirect_uri", "https://evil/cb"),
                ],
                "invalid_request",
            ),
            (
                vec![
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("scope", "openid admin"),
                ],
                "invalid_scope",
            ),
            (
                vec![("response_type", "token"), ("client_id", "c1")],
                "invalid_grant",
            ),
            (
                vec![
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("prompt", "none"),
                ],
                "interaction_required",
            ),
            (
                vec![
                    ("response_type", "code"),
                    ("client_id", "c1"),
                    ("response_mode", "web_message"),
                ],
                "server_error",
            ),
        ];

        for (pairs, expected) in cases {
            let error = endpoint
                .authorize(query(&pairs), user.clone())
                .await
                .unwrap_err();
            assert_eq!(error.error_code(), expected, "{:?}", pairs);
        }
    }
}
