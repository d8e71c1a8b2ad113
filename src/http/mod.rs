//! Axum HTTP server exposing the authorization endpoint and key discovery.

pub mod context;
mod handler_authorize;
mod handler_well_known;
pub mod server;

pub use context::{AppEngine, AppState};
pub use server::build_router;
