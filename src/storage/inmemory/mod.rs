//! Process-local storage backend.
//!
//! Keeps clients, users, key material and issued artifacts in memory. Key
//! rollover is only shared between key managers holding the same instance.

mod keys;
mod oauth;

pub use oauth::MemoryOAuthStorage;
