//! Handles GET /oidc/authorize for subjects authenticated by the upstream proxy

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_template::RenderHtml;
use minijinja::context;
use serde_json::json;

use super::context::AppState;
use crate::errors::AuthorizationError;
use crate::oauth::{AuthorizationResponse, AuthorizeQuery, User, validate_prompt};

/// Authorization endpoint handler
///
/// The subject comes from the configured authenticated-user header and must
/// already be provisioned in the user store.
pub async fn handle_authorize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, AuthorizationError> {
    validate_prompt(query.prompt.as_deref())?;

    let Some(user) = authenticated_user(&state, &headers).await? else {
        tracing::info!(
            client_id = ?query.client_id,
            "authorization request without authenticated user"
        );
        return Ok(unauthenticated());
    };

    match state.authorization_endpoint.authorize(query, user).await? {
        AuthorizationResponse::Redirect(location) => {
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
        AuthorizationResponse::FormPost {
            redirect_uri,
            parameters,
        } => Ok(RenderHtml(
            "form_post.html",
            state.template_env.clone(),
            context! {
                redirect_uri => redirect_uri,
                parameters => parameters,
            },
        )
        .into_response()),
    }
}

async fn authenticated_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<User>, AuthorizationError> {
    let sub = headers
        .get(state.config.authenticated_user_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match sub {
        Some(sub) => Ok(state.oauth_storage.find_user(sub).await?),
        None => Ok(None),
    }
}

fn unauthenticated() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "login_required",
            "error_description": "No authenticated user",
        })),
    )
        .into_response()
}
