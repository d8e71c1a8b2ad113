//! Handles the discovery document and the JWKS of the retained signing keys

use axum::{extract::State, response::Json};
use serde_json::{Value, json};
use std::sync::Arc;

use super::context::AppState;
use crate::errors::TokenError;
use crate::oauth::TokenGenerator;

/// OpenID Connect Configuration handler
/// GET /oidc/.well-known/openid-configuration
pub async fn openid_configuration_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.config.openid_configuration.to_json())
}

/// JWKS handler
/// GET /oidc/certs
///
/// Publishes the public half of every retained signing key, newest first.
pub async fn jwks_handler(
    State(token_generator): State<Arc<TokenGenerator>>,
) -> Result<Json<Value>, TokenError> {
    let keys = token_generator.key_manager().public_keys().await?;
    Ok(Json(json!({ "keys": keys })))
}
