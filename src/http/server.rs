//! Router configuration for the OpenID Connect endpoints.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::{
    context::AppState,
    handler_authorize::handle_authorize,
    handler_well_known::{jwks_handler, openid_configuration_handler},
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let oidc_routes = Router::new()
        .route("/authorize", get(handle_authorize))
        .route("/certs", get(jwks_handler))
        .route(
            "/.well-known/openid-configuration",
            get(openid_configuration_handler),
        );

    Router::new()
        .nest("/oidc", oidc_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
