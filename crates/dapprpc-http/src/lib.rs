//! dapprpc-http: HTTP transport for the dapprpc provider.
//!
//! Every envelope is POSTed on its own; the response body is handed back to
//! the provider as an inbound message, so correlation works exactly as it does
//! over a socket. HTTP cannot carry pushes, so `notification` never fires
//! over this transport.

pub mod client;

pub use client::{HttpTransport, HttpTransportConfig};
