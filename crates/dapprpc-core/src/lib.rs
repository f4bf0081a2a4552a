//! dapprpc-core: the client-side provider a dapp talks to a node through.
//!
//! # Overview
//!
//! The provider turns method calls into correlated JSON-RPC requests, routes
//! asynchronous responses back to their callers, and publishes subscription
//! pushes and connection/account/chain changes on a small event surface.
//!
//! - [`Provider`]: the facade, `request`, `on`, `remove_listener`, `emit`
//! - [`CorrelationTable`]: request id → pending call
//! - [`demux`]: splits inbound traffic into responses and pushes
//! - [`EventBus`]: named-channel listeners (`notification`, `connect`,
//!   `close`, `chainChanged`, `accountsChanged`, plus custom names)
//! - [`LifecycleController`]: connect/close state machine and reconnect policy
//! - [`Transport`]: what a concrete transport implements; [`MemoryTransport`]
//!   is an in-process one for tests
//! - [`legacy`]: `request_callback`, the callback-style adapter

pub mod codes;
pub mod correlation;
pub mod demux;
pub mod envelope;
pub mod error;
pub mod events;
pub mod legacy;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod provider;
pub mod session;
pub mod transport;

pub use correlation::CorrelationTable;
pub use envelope::{JsonRpcError, RequestEnvelope, ResponseEnvelope, SubscriptionParams, SubscriptionPush};
pub use error::{ProviderError, TransportError};
pub use events::{listener, Channel, EventBus, Listener, ListenerHandle, ProviderEvent};
pub use legacy::{LegacyPayload, LegacyResponse};
pub use lifecycle::{ConnectionState, LifecycleController};
pub use memory::MemoryTransport;
pub use policy::{ReconnectConfig, ReconnectPolicy};
pub use provider::{Provider, ProviderConfig};
pub use transport::{InboundSink, Transport, TransportEvent};
