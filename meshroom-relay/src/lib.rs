//! Reference signaling relay for meshroom participants.
//!
//! Assigns every WebSocket connection an identity, tracks room membership,
//! and forwards addressed frames with the sender stamped by the relay.

mod relay_config;
mod server;
mod signaling;

pub use relay_config::RelayConfig;
pub use server::{router, serve, serve_on};
pub use signaling::*;
