//! Connection lifecycle: `Disconnected → Connecting → Connected → Disconnected`.
//!
//! The controller owns the state machine and emits `connect` / `close` on the
//! event bus as transitions happen. It decides whether a reconnect should
//! follow a close but does not perform it; the provider schedules the attempt.

use std::sync::Mutex;
use std::time::Duration;

use crate::codes;
use crate::events::{EventBus, ProviderEvent};
use crate::policy::ReconnectPolicy;

/// Connection state as seen by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Result of a close signal that changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub code: u16,
    pub reason: String,
    /// Consecutive close count since the last `connect`.
    pub attempt: u32,
    /// When to re-issue a connect attempt, if at all.
    pub reconnect_after: Option<Duration>,
}

struct LifecycleInner {
    state: ConnectionState,
    attempt: u32,
    /// Set by a caller-initiated disconnect; suppresses reconnects until the
    /// caller connects again.
    shutdown: bool,
}

pub struct LifecycleController {
    inner: Mutex<LifecycleInner>,
    policy: ReconnectPolicy,
}

impl LifecycleController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                state: ConnectionState::Disconnected,
                attempt: 0,
                shutdown: false,
            }),
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state
    }

    /// `Disconnected → Connecting` on behalf of the caller. Clears a previous
    /// shutdown. Returns `false` if a connection is already live or being
    /// established.
    pub fn begin_connect(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != ConnectionState::Disconnected {
            return false;
        }
        inner.state = ConnectionState::Connecting;
        inner.shutdown = false;
        tracing::debug!("connection state → connecting");
        true
    }

    /// `Disconnected → Connecting` for a scheduled reconnect. Refused once the
    /// caller has asked to shut down, until the caller connects again.
    pub fn begin_reconnect(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.shutdown {
            tracing::debug!("reconnect skipped after shutdown");
            return false;
        }
        if inner.state != ConnectionState::Disconnected {
            return false;
        }
        inner.state = ConnectionState::Connecting;
        tracing::debug!("connection state → connecting (reconnect)");
        true
    }

    /// The transport confirmed the connection. Emits `connect` when entering
    /// `Connected`; a repeated confirmation is ignored.
    pub fn on_connected(&self, bus: &EventBus) -> bool {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == ConnectionState::Connected {
                return false;
            }
            inner.state = ConnectionState::Connected;
            inner.attempt = 0;
        }
        tracing::info!("connection state → connected");
        bus.emit(&ProviderEvent::Connect);
        true
    }

    /// The transport signalled a close. From `Connected` or `Connecting` this
    /// moves to `Disconnected` and emits `close(code, reason)`, filling in
    /// defaults from the close-code table. Ignored when already disconnected.
    pub fn on_closed(
        &self,
        bus: &EventBus,
        code: Option<u16>,
        reason: Option<String>,
    ) -> Option<CloseOutcome> {
        let (code, reason) = codes::close_defaults(code, reason);
        let (attempt, shutdown) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state == ConnectionState::Disconnected {
                return None;
            }
            inner.state = ConnectionState::Disconnected;
            inner.attempt += 1;
            (inner.attempt, inner.shutdown)
        };

        let reconnect_after = if shutdown {
            None
        } else {
            self.policy.next_delay(attempt)
        };
        tracing::info!(code, reason = %reason, attempt, "connection state → disconnected");
        bus.emit(&ProviderEvent::Close {
            code,
            reason: reason.clone(),
        });

        Some(CloseOutcome {
            code,
            reason,
            attempt,
            reconnect_after,
        })
    }

    /// Mark the next close as caller-initiated so no reconnect follows it.
    pub fn request_shutdown(&self) {
        self.inner.lock().unwrap().shutdown = true;
    }
}
