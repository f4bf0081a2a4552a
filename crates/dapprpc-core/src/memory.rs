//! In-memory transport for tests and embedding.
//!
//! Records every envelope the provider sends and lets the owner inject
//! inbound messages and connect/close signals by hand.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::envelope::RequestEnvelope;
use crate::error::TransportError;
use crate::transport::{InboundSink, Transport, TransportEvent};

/// A transport with no wire: sends are recorded, inbound traffic is injected.
pub struct MemoryTransport {
    name: String,
    auto_confirm: bool,
    sink: Mutex<Option<InboundSink>>,
    sent: Mutex<Vec<String>>,
    sent_notify: Notify,
    connect_attempts: Mutex<u32>,
    fail_sends: Mutex<Option<TransportError>>,
}

impl MemoryTransport {
    /// A transport whose `connect` immediately reports `Connected`.
    pub fn new() -> Self {
        Self::with_auto_confirm(true)
    }

    /// With `auto_confirm = false`, `connect` only records the attempt and the
    /// owner decides when (or whether) to call [`signal_connected`](Self::signal_connected).
    pub fn with_auto_confirm(auto_confirm: bool) -> Self {
        Self {
            name: "memory".into(),
            auto_confirm,
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            connect_attempts: Mutex::new(0),
            fail_sends: Mutex::new(None),
        }
    }

    fn report(&self, event: TransportEvent) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send(event),
            None => false,
        }
    }

    /// Deliver a raw inbound message to the provider.
    pub fn inject(&self, raw: impl Into<String>) -> bool {
        self.report(TransportEvent::Message(raw.into()))
    }

    pub fn signal_connected(&self) -> bool {
        self.report(TransportEvent::Connected)
    }

    pub fn signal_closed(&self, code: Option<u16>, reason: Option<&str>) -> bool {
        self.report(TransportEvent::Closed {
            code,
            reason: reason.map(str::to_string),
        })
    }

    pub fn signal_chain_changed(&self, chain_id: &str) -> bool {
        self.report(TransportEvent::ChainChanged(chain_id.to_string()))
    }

    pub fn signal_accounts_changed(&self, accounts: &[&str]) -> bool {
        self.report(TransportEvent::AccountsChanged(
            accounts.iter().map(|a| a.to_string()).collect(),
        ))
    }

    /// Make every following `send` fail with `error` (`None` restores sending).
    pub fn fail_sends(&self, error: Option<TransportError>) {
        *self.fail_sends.lock().unwrap() = error;
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent messages parsed back into request envelopes (unparseable ones skipped).
    pub fn sent_envelopes(&self) -> Vec<RequestEnvelope> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    /// Wait until at least `count` messages have been sent.
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            if self.sent.lock().unwrap().len() >= count {
                return;
            }
            self.sent_notify.notified().await;
        }
    }

    pub fn connect_attempts(&self) -> u32 {
        *self.connect_attempts.lock().unwrap()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn bind(&self, sink: InboundSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn connect(&self) -> Result<(), TransportError> {
        *self.connect_attempts.lock().unwrap() += 1;
        if self.auto_confirm {
            self.signal_connected();
        }
        Ok(())
    }

    async fn send(&self, message: String) -> Result<(), TransportError> {
        if let Some(err) = self.fail_sends.lock().unwrap().clone() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(message);
        self.sent_notify.notify_one();
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.signal_closed(Some(crate::codes::CLOSE_NORMAL), None);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
