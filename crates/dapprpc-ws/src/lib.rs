//! dapprpc-ws: WebSocket transport for the dapprpc provider.
//!
//! # Features
//! - One background task per connection owns the socket
//! - Text and UTF-8 binary frames are forwarded as inbound messages
//! - Close frames are reported with their code and reason
//! - Reconnection is driven by the provider's lifecycle policy

pub mod client;

pub use client::{WsTransport, WsTransportConfig};
