//! OpenID Connect authorization endpoint and token issuance.

pub mod authorization;
pub mod openid;
pub mod request;
pub mod token_generator;
pub mod types;

// Re-export frequently used items from each module
pub use authorization::{AuthorizationEndpoint, AuthorizationResponse};
pub use openid::OpenIDClaims;
pub use request::{AuthorizationRequest, AuthorizeQuery, RequestObjectResolver, validate_prompt};
pub use token_generator::{AuthorizationEndpointIdToken, TokenGenerator};
pub use types::{
    AccessToken, AuthorizationCode, GrantType, OpenIDClient, RefreshToken, ResponseMode,
    ResponseType, User, parse_scope,
};
