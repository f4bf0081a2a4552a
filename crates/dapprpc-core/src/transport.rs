//! The `Transport` trait: the boundary between the provider and whatever
//! actually carries bytes to the node.
//!
//! A transport only has to send serialized envelopes and report what it
//! observes (messages, connect/close signals, node-side chain or account
//! changes) through the [`InboundSink`] it is bound to.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Something a transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is up.
    Connected,
    /// A raw inbound message (response, push, or noise).
    Message(String),
    /// The connection went away. Missing fields are filled from the close-code table.
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// The node switched chains.
    ChainChanged(String),
    /// The set of authorized accounts changed.
    AccountsChanged(Vec<String>),
}

/// Sending half of the provider's inbound queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InboundSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl InboundSink {
    /// Create a sink and the receiver the provider drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event. Returns `false` if the provider is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn connected(&self) -> bool {
        self.send(TransportEvent::Connected)
    }

    pub fn message(&self, raw: impl Into<String>) -> bool {
        self.send(TransportEvent::Message(raw.into()))
    }

    pub fn closed(&self, code: Option<u16>, reason: Option<String>) -> bool {
        self.send(TransportEvent::Closed { code, reason })
    }

    pub fn chain_changed(&self, chain_id: impl Into<String>) -> bool {
        self.send(TransportEvent::ChainChanged(chain_id.into()))
    }

    pub fn accounts_changed(&self, accounts: Vec<String>) -> bool {
        self.send(TransportEvent::AccountsChanged(accounts))
    }

    /// Returns `true` once the provider has stopped draining the queue.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The async trait every transport implements.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the provider stores them as
/// `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Attach the sink inbound traffic is reported to. Called once by the
    /// provider before any other method.
    fn bind(&self, sink: InboundSink);

    /// Start a connection attempt. Success is confirmed by reporting
    /// [`TransportEvent::Connected`]; an `Err` means the attempt failed outright.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Deliver one serialized envelope.
    async fn send(&self, message: String) -> Result<(), TransportError>;

    /// Tear the connection down. Transports should report
    /// [`TransportEvent::Closed`] once it is gone.
    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Identifier for logs (URL or name).
    fn name(&self) -> &str;
}
