//! Application state shared by the HTTP handlers.

use axum::extract::FromRef;
use axum_template::engine::Engine;
use std::sync::Arc;

use crate::config::Config;
use crate::oauth::{AuthorizationEndpoint, TokenGenerator};
use crate::storage::traits::OAuthStorage;

#[cfg(feature = "reload")]
use minijinja_autoreload::AutoReloader;

#[cfg(feature = "reload")]
/// Template engine with auto-reloading support for development.
pub type AppEngine = Engine<AutoReloader>;

#[cfg(not(feature = "reload"))]
pub type AppEngine = Engine<minijinja::Environment<'static>>;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
    /// Template engine for rendering HTML responses.
    pub template_env: AppEngine,
    /// Clients, users, keys and issued artifacts
    pub oauth_storage: Arc<dyn OAuthStorage>,
    pub token_generator: Arc<TokenGenerator>,
    pub authorization_endpoint: Arc<AuthorizationEndpoint>,
}

impl AppState {
    /// Wire the authorization endpoint to the given storage and token generator
    pub fn new(
        http_client: reqwest::Client,
        config: Arc<Config>,
        template_env: AppEngine,
        oauth_storage: Arc<dyn OAuthStorage>,
        token_generator: Arc<TokenGenerator>,
    ) -> Self {
        let authorization_endpoint = Arc::new(AuthorizationEndpoint::new(
            oauth_storage.clone(),
            token_generator.clone(),
            http_client.clone(),
            *config.authorization_code_expiration.as_ref(),
        ));
        Self {
            http_client,
            config,
            template_env,
            oauth_storage,
            token_generator,
            authorization_endpoint,
        }
    }
}

impl FromRef<AppState> for Arc<TokenGenerator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_generator.clone()
    }
}
