//! Authorization request parsing, request object expansion and prompt validation.

use jsonwebtoken::{DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AuthorizationError;
use crate::oauth::types::{OPENID_SCOPE, OpenIDClient, ResponseMode, ResponseType, parse_scope};

/// The only prompt value this server honours, authentication is always fresh
pub const SUPPORTED_PROMPT: &str = "login";

/// Raw query parameters of `GET /oidc/authorize`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub prompt: Option<String>,
    pub response_mode: Option<String>,
    /// Request object passed by value
    pub request: Option<String>,
    /// Request object passed by reference
    pub request_uri: Option<String>,
    /// JSON claims request, only the `id_token` member is honoured
    pub claims: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub login_hint: Option<String>,
    pub max_age: Option<String>,
}

/// Validated shape of an authorization request
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationRequest {
    pub response_type: ResponseType,
    pub client_id: String,
    pub redirect_uri: Option<String>,
    /// Requested scopes in request order
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub prompt: Option<String>,
    pub response_mode: Option<ResponseMode>,
    /// User claims requested for the ID token
    pub claims: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub request: Option<String>,
    pub request_uri: Option<String>,
}

impl AuthorizationRequest {
    pub fn parse(query: AuthorizeQuery) -> Result<Self, AuthorizationError> {
        let client_id = non_empty(query.client_id).ok_or_else(|| {
            AuthorizationError::InvalidRequest("Missing client_id parameter".to_string())
        })?;
        let response_type_value = non_empty(query.response_type).ok_or_else(|| {
            AuthorizationError::InvalidRequest("Missing response_type parameter".to_string())
        })?;
        let response_type = ResponseType::parse(&response_type_value)
            .map_err(|_| AuthorizationError::UnsupportedResponseType(response_type_value.clone()))?;

        let claims = match non_empty(query.claims) {
            Some(value) => requested_id_token_claims(&value)?,
            None => Vec::new(),
        };

        Ok(Self {
            response_type,
            client_id,
            redirect_uri: non_empty(query.redirect_uri),
            scopes: query.scope.as_deref().map(parse_scope).unwrap_or_default(),
            state: query.state,
            nonce: query.nonce,
            prompt: non_empty(query.prompt),
            response_mode: non_empty(query.response_mode).map(|value| ResponseMode::parse(&value)),
            claims,
            code_challenge: non_empty(query.code_challenge),
            code_challenge_method: non_empty(query.code_challenge_method),
            request: non_empty(query.request),
            request_uri: non_empty(query.request_uri),
        })
    }

    /// OpenID Connect requests are recognised by the `openid` scope alone
    pub fn is_openid_request(&self) -> bool {
        self.scopes.iter().any(|scope| scope == OPENID_SCOPE)
    }

    pub fn specifies_request_object(&self) -> bool {
        self.request.is_some() || self.request_uri.is_some()
    }

    /// The explicit `response_mode`, or the one implied by the response type
    pub fn response_mode(&self) -> ResponseMode {
        self.response_mode
            .clone()
            .unwrap_or_else(|| self.response_type.implied_response_mode())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Claim names listed under `id_token` in a JSON claims request
fn requested_id_token_claims(value: &str) -> Result<Vec<String>, AuthorizationError> {
    let claims: Value = serde_json::from_str(value).map_err(|e| {
        AuthorizationError::InvalidRequest(format!("Invalid claims parameter: {}", e))
    })?;
    Ok(claims
        .get("id_token")
        .and_then(Value::as_object)
        .map(|members| members.keys().cloned().collect())
        .unwrap_or_default())
}

/// Fail unless `prompt` is absent or exactly `login`
pub fn validate_prompt(prompt: Option<&str>) -> Result<(), AuthorizationError> {
    match prompt.map(str::trim) {
        None | Some("") | Some(SUPPORTED_PROMPT) => Ok(()),
        Some(other) => Err(AuthorizationError::UnsupportedPromptValue {
            prompt: other.to_string(),
            error_code: unsupported_prompt_error_code(other),
        }),
    }
}

fn unsupported_prompt_error_code(prompt: &str) -> &'static str {
    match prompt {
        "none" => "interaction_required",
        "consent" => "consent_required",
        "select_account" => "account_selection_required",
        _ => "invalid_request",
    }
}

/// Expands signed request objects into the parameters they carry
#[derive(Clone)]
pub struct RequestObjectResolver {
    http_client: reqwest::Client,
}

impl RequestObjectResolver {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Replace the parameters of `query` with those of its request object.
    ///
    /// The request object is verified with the client's registered RSA public
    /// key or, failing that, with the keys published at its `jwks_uri`.
    pub async fn expand(
        &self,
        query: AuthorizeQuery,
        client: &OpenIDClient,
    ) -> Result<AuthorizeQuery, AuthorizationError> {
        let jwt = match (non_empty(query.request.clone()), non_empty(query.request_uri.clone())) {
            (Some(request), _) => request,
            (None, Some(request_uri)) => self.fetch_text(&request_uri).await?,
            (None, None) => return Ok(query),
        };

        let header = decode_header(&jwt).map_err(|e| {
            AuthorizationError::InvalidRequest(format!("Invalid request object header: {}", e))
        })?;
        let key = self.decoding_key(client, header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let object = decode::<Map<String, Value>>(&jwt, &key, &validation)
            .map_err(|e| {
                AuthorizationError::InvalidRequest(format!("Invalid request object: {}", e))
            })?
            .claims;

        if let Some(object_client_id) = object.get("client_id").and_then(Value::as_str) {
            if query.client_id.as_deref() != Some(object_client_id) {
                return Err(AuthorizationError::InvalidRequest(format!(
                    "Request object client_id {} does not match {}",
                    object_client_id, client.client_id
                )));
            }
        }

        tracing::debug!(client_id = %client.client_id, "expanded request object");
        merge_request_object(query, object)
    }

    async fn decoding_key(
        &self,
        client: &OpenIDClient,
        kid: Option<&str>,
    ) -> Result<DecodingKey, AuthorizationError> {
        if let Some(pem) = client
            .signing_certificate
            .as_deref()
            .filter(|pem| !pem.trim().is_empty())
        {
            return DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
                AuthorizationError::InvalidRequest(format!(
                    "Invalid signing certificate of client {}: {}",
                    client.client_id, e
                ))
            });
        }

        let jwks_uri = client
            .jwks_uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or_else(|| {
                AuthorizationError::InvalidRequest(format!(
                    "Client {} has no signing certificate or jwks_uri to verify the request object",
                    client.client_id
                ))
            })?;

        let jwks: JwkSet = self
            .http_client
            .get(jwks_uri)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| {
                AuthorizationError::InvalidRequest(format!("Failed to fetch {}: {}", jwks_uri, e))
            })?
            .json()
            .await
            .map_err(|e| {
                AuthorizationError::InvalidRequest(format!("Invalid JWKS at {}: {}", jwks_uri, e))
            })?;

        let jwk = match kid {
            Some(kid) => jwks.find(kid),
            None => jwks.keys.first(),
        }
        .ok_or_else(|| {
            AuthorizationError::InvalidRequest(format!(
                "No key {} published at {}",
                kid.unwrap_or_default(),
                jwks_uri
            ))
        })?;

        DecodingKey::from_jwk(jwk).map_err(|e| {
            AuthorizationError::InvalidRequest(format!("Unusable key at {}: {}", jwks_uri, e))
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, AuthorizationError> {
        self.http_client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthorizationError::InvalidRequest(format!("Failed to fetch {}: {}", url, e)))?
            .text()
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| AuthorizationError::InvalidRequest(format!("Failed to read {}: {}", url, e)))
    }
}

/// Request object members take precedence over query parameters
fn merge_request_object(
    query: AuthorizeQuery,
    object: Map<String, Value>,
) -> Result<AuthorizeQuery, AuthorizationError> {
    let mut parameters = match serde_json::to_value(query) {
        Ok(Value::Object(parameters)) => parameters,
        _ => Map::new(),
    };
    parameters.remove("request");
    parameters.remove("request_uri");

    for (name, value) in object {
        let value = match value {
            Value::String(value) => value,
            Value::Null => continue,
            other => other.to_string(),
        };
        parameters.insert(name, Value::String(value));
    }

    // Members outside of AuthorizeQuery, such as iss or aud, are ignored
    serde_json::from_value(Value::Object(parameters)).map_err(|e| {
        AuthorizationError::InvalidRequest(format!("Invalid request object parameters: {}", e))
    })
}
