//! Connection policies.

pub mod reconnect;

pub use reconnect::{ReconnectConfig, ReconnectPolicy};
