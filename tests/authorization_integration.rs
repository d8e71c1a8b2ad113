//! Authorization endpoint integration tests
//!
//! These tests drive the complete router: a provisioned user and client, an
//! authorization request through `/oidc/authorize`, and verification of the
//! returned tokens against the published JWKS.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use oidcng::config::{Config, DEFAULT_ACR_VALUE, OpenIDConfiguration};
use oidcng::http::{AppEngine, AppState, build_router};
use oidcng::keys::{AeadKeyset, KeyManager};
use oidcng::oauth::{GrantType, OpenIDClient, TokenGenerator, User};
use oidcng::storage::{MemoryOAuthStorage, OAuthStorage};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const ISSUER: &str = "https://op.example.com";
const USER_HEADER: &str = "x-authenticated-sub";

fn config() -> Config {
    Config {
        version: "test".to_string(),
        issuer: ISSUER.to_string(),
        http_port: "8080".to_string().try_into().unwrap(),
        http_templates_path: concat!(env!("CARGO_MANIFEST_DIR"), "/templates").to_string(),
        secret_key_set_path: "secret_key_set.json".to_string(),
        associated_data: "oidcng-integration".to_string(),
        openid_configuration: OpenIDConfiguration::built_in(ISSUER),
        default_acr_value: DEFAULT_ACR_VALUE.to_string(),
        authorization_code_expiration: "10m".to_string().try_into().unwrap(),
        authenticated_user_header: USER_HEADER.to_string(),
        storage_backend: "memory".to_string(),
        database_url: None,
        cleaner_enabled: "false".to_string().try_into().unwrap(),
        cleaner_interval: "5m".to_string().try_into().unwrap(),
        user_retention: "1d".to_string().try_into().unwrap(),
        fixed_clock: None::<String>.try_into().unwrap(),
    }
}

async fn setup(client: OpenIDClient) -> (Router, Arc<dyn OAuthStorage>) {
    let config = config();
    let storage: Arc<dyn OAuthStorage> = Arc::new(MemoryOAuthStorage::new());
    let key_manager = KeyManager::new(
        AeadKeyset::generate(),
        &config.associated_data,
        storage.clone(),
    );
    key_manager.initialize().await.unwrap();
    let token_generator = Arc::new(TokenGenerator::new(
        Arc::new(key_manager),
        ISSUER,
        config.openid_configuration.acr_values_supported.clone(),
        &config.default_acr_value,
    ));
    let template_env = AppEngine::from(oidcng::templates::build_env(
        &config.http_templates_path,
        config.version.clone(),
    ));

    storage.store_client(&client).await.unwrap();
    let mut user = User::new("sub1");
    user.attributes
        .insert("email".to_string(), serde_json::json!("sub1@example.com"));
    storage.store_user(&user).await.unwrap();

    let state = AppState::new(
        reqwest::Client::new(),
        Arc::new(config),
        template_env,
        storage.clone(),
        token_generator,
    );
    (build_router(state), storage)
}

async fn get(router: &Router, uri: &str, sub: Option<&str>) -> axum::response::Response {
    let mut request = Request::builder().uri(uri);
    if let Some(sub) = sub {
        request = request.header(USER_HEADER, sub);
    }
    router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    assert_eq!(response.status(), StatusCode::FOUND);
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

fn fragment_parameters(location: &str) -> Vec<(String, String)> {
    let (_, fragment) = location.split_once('#').unwrap();
    fragment
        .split('&')
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap();
            (name.to_string(), value.to_string())
        })
        .collect()
}

async fn verify_with_published_keys(router: &Router, token: &str) -> Value {
    let jwks: JwkSet = serde_json::from_value(body_json(get(router, "/oidc/certs", None).await).await)
        .unwrap();
    let kid = decode_header(token).unwrap().kid.unwrap();
    let jwk = jwks.find(&kid).unwrap();

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&["c1"]);
    validation.set_issuer(&[ISSUER]);
    decode::<Value>(token, &DecodingKey::from_jwk(jwk).unwrap(), &validation)
        .unwrap()
        .claims
}

#[tokio::test]
async fn test_authorization_code_flow() {
    let client = OpenIDClient::new(
        "c1",
        vec!["https://rp/cb".to_string()],
        vec!["openid".to_string()],
        vec![GrantType::AuthorizationCode],
    );
    let (router, storage) = setup(client).await;

    let response = get(
        &router,
        "/oidc/authorize?response_type=code&client_id=c1&scope=openid&redirect_uri=https%3A%2F%2Frp%2Fcb&state=xyz",
        Some("sub1"),
    )
    .await;
    let location = location(&response);

    let url = url::Url::parse(&location).unwrap();
    assert_eq!(url.as_str().split('?').next(), Some("https://rp/cb"));
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].0, "code");
    assert_eq!(pairs[1], ("state".to_string(), "xyz".to_string()));

    let code = storage.find_code(&pairs[0].1).await.unwrap().unwrap();
    assert_eq!(code.sub, "sub1");
    assert_eq!(code.client_id, "c1");
    assert_eq!(code.scopes, vec!["openid".to_string()]);
    assert_eq!(code.redirect_uri, "https://rp/cb");

    // The token endpoint still needs the user after a code flow
    assert!(storage.find_user("sub1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_implicit_flow_tokens_verify_against_jwks() {
    let mut client = OpenIDClient::new(
        "c1",
        vec!["https://rp/cb".to_string()],
        vec!["openid".to_string()],
        vec![GrantType::Implicit],
    );
    client.access_token_validity = 600;
    let (router, storage) = setup(client).await;

    let response = get(
        &router,
        "/oidc/authorize?response_type=id_token%20token&client_id=c1&scope=openid%20email&response_mode=fragment&nonce=n-0S6",
        Some("sub1"),
    )
    .await;
    let parameters = fragment_parameters(&location(&response));

    let names: Vec<&str> = parameters.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["access_token", "token_type", "id_token", "expires_in"]);
    assert_eq!(parameters[1].1, "Bearer");
    assert_eq!(parameters[3].1, "600");

    let id_token = verify_with_published_keys(&router, &parameters[2].1).await;
    assert_eq!(id_token["sub"], "sub1");
    assert_eq!(id_token["nonce"], "n-0S6");
    assert!(id_token["at_hash"].is_string());

    let access_token = verify_with_published_keys(&router, &parameters[0].1).await;
    assert_eq!(access_token["sub"], "c1");
    assert!(access_token["claims"].is_string());

    assert!(storage.find_user("sub1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_form_post_response() {
    let client = OpenIDClient::new(
        "c1",
        vec!["https://rp/cb".to_string()],
        vec!["openid".to_string()],
        vec![GrantType::AuthorizationCode],
    );
    let (router, _) = setup(client).await;

    let response = get(
        &router,
        "/oidc/authorize?response_type=code&client_id=c1&scope=openid&response_mode=form_post&state=abc",
        Some("sub1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();

    assert!(html.contains(r#"<form method="post""#));
    assert!(html.contains(r#"name="code""#));
    assert!(html.contains(r#"name="state" value="abc""#));
}

#[tokio::test]
async fn test_error_responses() {
    let client = OpenIDClient::new(
        "c1",
        vec!["https://rp/cb".to_string()],
        vec!["openid".to_string()],
        vec![GrantType::AuthorizationCode],
    );
    let (router, _) = setup(client).await;

    let cases = [
        (
            "/oidc/authorize?response_type=code&client_id=c1&prompt=consent",
            StatusCode::BAD_REQUEST,
            "consent_required",
        ),
        (
            "/oidc/authorize?response_type=code&client_id=unknown",
            StatusCode::UNAUTHORIZED,
            "unauthorized_client",
        ),
        (
            "/oidc/authorize?response_type=code&client_id=c1&redirect_uri=https%3A%2F%2Fevil%2Fcb",
            StatusCode::BAD_REQUEST,
            "invalid_request",
        ),
        (
            "/oidc/authorize?response_type=code&client_id=c1&scope=openid%20admin",
            StatusCode::BAD_REQUEST,
            "invalid_scope",
        ),
        (
            "/oidc/authorize?response_type=token&client_id=c1&scope=openid",
            StatusCode::BAD_REQUEST,
            "invalid_grant",
        ),
    ];

    for (uri, status, error) in cases {
        let response = get(&router, uri, Some("sub1")).await;
        assert_eq!(response.status(), status, "{uri}");
        assert_eq!(body_json(response).await["error"], error, "{uri}");
    }

    let response = get(
        &router,
        "/oidc/authorize?response_type=code&client_id=c1",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_discovery_document() {
    let client = OpenIDClient::new("c1", vec![], vec![], vec![]);
    let (router, _) = setup(client).await;

    let response = get(&router, "/oidc/.well-known/openid-configuration", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let document = body_json(response).await;

    assert_eq!(document["issuer"], ISSUER);
    assert_eq!(document["jwks_uri"], "https://op.example.com/oidc/certs");
}
