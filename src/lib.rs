//! oidcng: an OpenID Connect authorization server.
//!
//! Issues authorization codes, access tokens and ID tokens for users
//! authenticated by an upstream SAML service provider, with envelope
//! encrypted signing keys that rotate without downtime.

pub mod config;
pub mod errors;
pub mod http;
pub mod keys;
pub mod oauth;
pub mod storage;
pub mod templates;
