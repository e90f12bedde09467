//! Signed-in features: tokens, the remote diagrams API and the per-user cloud session.

pub mod auth;
pub mod client;
pub mod session;

#[cfg(feature = "cloud")]
pub mod http;
