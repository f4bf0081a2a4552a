//! The provider facade: request dispatch, event subscription and the driver
//! task that feeds inbound traffic through the demultiplexer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::codes;
use crate::correlation::CorrelationTable;
use crate::demux::{self, Routed};
use crate::envelope::RequestEnvelope;
use crate::error::ProviderError;
use crate::events::{Channel, EventBus, Listener, ListenerHandle, ProviderEvent};
use crate::lifecycle::{ConnectionState, LifecycleController};
use crate::policy::{ReconnectConfig, ReconnectPolicy};
use crate::session::Session;
use crate::transport::{InboundSink, Transport, TransportEvent};

/// Configuration for [`Provider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Fail a request with [`ProviderError::Timeout`] if no response arrives
    /// in time. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Reject every pending call with [`ProviderError::Disconnected`] when the
    /// connection closes. When `false`, pending calls stay pending across a
    /// close and may still be answered after a reconnect.
    pub reject_pending_on_close: bool,
    /// Automatic reconnection after `close`.
    pub reconnect: ReconnectConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            reject_pending_on_close: false,
            reconnect: ReconnectConfig::default(),
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    sink: InboundSink,
    table: CorrelationTable,
    bus: EventBus,
    lifecycle: LifecycleController,
    session: Session,
    config: ProviderConfig,
}

/// Client-side JSON-RPC provider.
///
/// Cloning is cheap; clones share one correlation table, one event bus and one
/// connection. All inbound traffic is handled by a single driver task, one
/// event at a time in arrival order, and listeners run to completion before the
/// next event is taken.
#[derive(Clone)]
pub struct Provider {
    inner: Arc<Inner>,
}

/// Removes a pending entry if the request future is dropped before settling.
struct PendingGuard<'a> {
    table: &'a CorrelationTable,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.table.remove(self.id) {
            tracing::debug!(id = self.id, "pending call abandoned");
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Provider {
    /// Bind `transport` and start the driver task.
    ///
    /// Must be called from within a Tokio runtime. Does not connect; call
    /// [`connect`](Self::connect) for that.
    pub fn new(transport: Arc<dyn Transport>, config: ProviderConfig) -> Self {
        let (sink, rx) = InboundSink::channel();
        transport.bind(sink.clone());
        let inner = Arc::new(Inner {
            transport,
            sink,
            table: CorrelationTable::new(),
            bus: EventBus::new(),
            lifecycle: LifecycleController::new(ReconnectPolicy::new(config.reconnect.clone())),
            session: Session::new(),
            config,
        });
        tokio::spawn(drive(Arc::downgrade(&inner), rx));
        Self { inner }
    }

    /// Create with default configuration.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, ProviderConfig::default())
    }

    // ─── Requests ─────────────────────────────────────────────────────────────

    /// Send `method` with `params` (an array, or null for none) and wait for
    /// the matching response.
    ///
    /// Invalid arguments fail immediately with
    /// [`ProviderError::InvalidArgument`] and nothing is sent. Otherwise the
    /// future settles once, when a response with the same id arrives, when the
    /// configured timeout fires, or when a close sweeps pending calls.
    /// Dropping the future forgets the call.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        if method.trim().is_empty() {
            return Err(ProviderError::InvalidArgument(
                "method must be a non-empty string".into(),
            ));
        }
        let params = match params {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ProviderError::InvalidArgument(format!(
                    "params must be an array, got {}",
                    json_kind(&other)
                )))
            }
        };

        let table = &self.inner.table;
        let (id, rx) = table.allocate(method);
        let _guard = PendingGuard { table, id };

        let envelope = RequestEnvelope::new(id, method, params);
        let text = serde_json::to_string(&envelope)?;
        tracing::debug!(id, method, transport = self.inner.transport.name(), "sending request");
        if let Err(e) = self.inner.transport.send(text).await {
            tracing::warn!(id, method, error = %e, "send failed");
            return Err(e.into());
        }

        let settled = match self.inner.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(settled) => settled,
                Err(_) => {
                    tracing::warn!(id, method, timeout_ms = limit.as_millis() as u64, "request timed out");
                    return Err(ProviderError::Timeout {
                        ms: limit.as_millis() as u64,
                    });
                }
            },
            None => rx.await,
        };
        settled.map_err(|_| ProviderError::Closed)?
    }

    /// Convenience: call a method and deserialize the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ProviderError> {
        let result = self.request(method, Value::Array(params)).await?;
        serde_json::from_value(result).map_err(ProviderError::Deserialization)
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.inner.table.len()
    }

    /// Ids of calls that have waited at least `age`, oldest first.
    pub fn stale_requests(&self, age: Duration) -> Vec<u64> {
        self.inner.table.older_than(age)
    }

    // ─── Inbound ──────────────────────────────────────────────────────────────

    /// Route one raw inbound message. The driver calls this for every
    /// [`TransportEvent::Message`]; it is public so embedders without a
    /// [`Transport`] can feed messages directly.
    pub fn handle_inbound(&self, raw: &str) -> Routed {
        demux::route(raw, &self.inner.table, &self.inner.bus)
    }

    // ─── Events ───────────────────────────────────────────────────────────────

    pub fn on(&self, channel: impl Into<Channel>, listener: Listener) -> ListenerHandle {
        self.inner.bus.on(channel, listener)
    }

    pub fn once(&self, channel: impl Into<Channel>, listener: Listener) -> ListenerHandle {
        self.inner.bus.once(channel, listener)
    }

    pub fn remove_listener(&self, channel: impl Into<Channel>, listener: &Listener) -> bool {
        self.inner.bus.remove_listener(channel, listener)
    }

    pub fn off(&self, handle: &ListenerHandle) -> bool {
        self.inner.bus.off(handle)
    }

    pub fn listener_count(&self, channel: impl Into<Channel>) -> usize {
        self.inner.bus.listener_count(channel)
    }

    /// Publish `event` to its channel's listeners; returns how many ran.
    pub fn emit(&self, event: ProviderEvent) -> usize {
        self.inner.bus.emit(&event)
    }

    // ─── Connection ───────────────────────────────────────────────────────────

    /// Start a connection attempt. `connect` is emitted once the transport
    /// confirms. A no-op while already connecting or connected.
    pub async fn connect(&self) -> Result<(), ProviderError> {
        self.inner.clone().connect_attempt(0, false).await
    }

    /// Close the connection without scheduling a reconnect.
    pub async fn disconnect(&self) -> Result<(), ProviderError> {
        self.inner.lifecycle.request_shutdown();
        self.inner.transport.close().await?;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn transport_name(&self) -> &str {
        self.inner.transport.name()
    }

    // ─── Node state ───────────────────────────────────────────────────────────

    /// Last chain id reported by the node layer.
    pub fn chain_id(&self) -> Option<String> {
        self.inner.session.chain_id()
    }

    /// Last authorized accounts reported by the node layer.
    pub fn accounts(&self) -> Vec<String> {
        self.inner.session.accounts()
    }

    /// Report a chain id; emits `chainChanged` if it differs from the last one.
    pub fn set_chain_id(&self, chain_id: impl Into<String>) -> bool {
        self.inner.session.set_chain_id(&self.inner.bus, chain_id.into())
    }

    /// Report authorized accounts; emits `accountsChanged` on change.
    pub fn set_accounts(&self, accounts: Vec<String>) -> bool {
        self.inner.session.set_accounts(&self.inner.bus, accounts)
    }
}

impl Inner {
    /// `scheduled` attempts come from the reconnect timer and yield to a
    /// caller-requested shutdown.
    async fn connect_attempt(self: Arc<Self>, attempt: u32, scheduled: bool) -> Result<(), ProviderError> {
        let started = if scheduled {
            self.lifecycle.begin_reconnect()
        } else {
            self.lifecycle.begin_connect()
        };
        if !started {
            return Ok(());
        }
        tracing::info!(transport = self.transport.name(), attempt, "connecting");
        if let Err(e) = self.transport.connect().await {
            tracing::warn!(transport = self.transport.name(), attempt, error = %e, "connect attempt failed");
            self.sink.closed(Some(codes::CLOSE_ABNORMAL), Some(e.to_string()));
            return Err(e.into());
        }
        Ok(())
    }

    fn handle_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.lifecycle.on_connected(&self.bus);
            }
            TransportEvent::Message(raw) => {
                demux::route(&raw, &self.table, &self.bus);
            }
            TransportEvent::Closed { code, reason } => {
                let Some(outcome) = self.lifecycle.on_closed(&self.bus, code, reason) else {
                    return;
                };
                if self.config.reject_pending_on_close {
                    let swept = self.table.reject_all(|| ProviderError::Disconnected {
                        code: outcome.code,
                        reason: outcome.reason.clone(),
                    });
                    if swept > 0 {
                        tracing::warn!(swept, code = outcome.code, "rejected pending calls on close");
                    }
                }
                if let Some(delay) = outcome.reconnect_after {
                    tracing::info!(
                        attempt = outcome.attempt,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    tokio::spawn(reconnect_after(Arc::downgrade(self), delay, outcome.attempt));
                }
            }
            TransportEvent::ChainChanged(chain_id) => {
                self.session.set_chain_id(&self.bus, chain_id);
            }
            TransportEvent::AccountsChanged(accounts) => {
                self.session.set_accounts(&self.bus, accounts);
            }
        }
    }
}

async fn reconnect_after(inner: Weak<Inner>, delay: Duration, attempt: u32) {
    tokio::time::sleep(delay).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    // failures re-enter the loop through the close signal connect_attempt queues
    let _ = inner.connect_attempt(attempt, true).await;
}

/// Drains transport events one at a time until the provider is dropped.
async fn drive(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_event(event);
    }
    tracing::debug!("provider driver stopped");
}
