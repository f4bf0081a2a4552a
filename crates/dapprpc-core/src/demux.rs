//! Inbound message demultiplexer.
//!
//! Splits raw inbound text into correlated responses (routed to the
//! [`CorrelationTable`]) and subscription pushes (published on the
//! `notification` channel). Anything else is dropped without reaching a
//! caller or listener.

use serde_json::{Map, Value};

use crate::codes;
use crate::correlation::CorrelationTable;
use crate::envelope::{is_subscription_method, JsonRpcError, ResponseEnvelope, JSONRPC_VERSION};
use crate::error::ProviderError;
use crate::events::{EventBus, ProviderEvent};

/// Why an inbound message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    Unparseable,
    /// Not an object carrying `"jsonrpc": "2.0"`.
    NotEnvelope,
    /// `id` present but not an unsigned integer, so it cannot be ours.
    ForeignId,
    /// No `id` and not a `*_subscription` push.
    NotSubscription,
    /// Subscription push without `params`.
    MissingParams,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Empty => "empty message",
            Self::Unparseable => "not valid JSON",
            Self::NotEnvelope => "missing jsonrpc 2.0 marker",
            Self::ForeignId => "id is not a request id",
            Self::NotSubscription => "push is not a subscription",
            Self::MissingParams => "subscription push without params",
        };
        f.write_str(s)
    }
}

/// Classification of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A response to request `id`.
    Response {
        id: u64,
        outcome: Result<Value, JsonRpcError>,
    },
    /// `params` of a subscription push, untouched.
    Push(Value),
    Ignored(IgnoreReason),
}

/// What [`route`] did with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Resolved(u64),
    Rejected(u64),
    /// Response for an id that is not pending (duplicate or stale).
    Stale(u64),
    Published,
    Ignored(IgnoreReason),
}

/// Classify raw inbound text without touching any state.
pub fn classify(raw: &str) -> Inbound {
    if raw.trim().is_empty() {
        return Inbound::Ignored(IgnoreReason::Empty);
    }
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return Inbound::Ignored(IgnoreReason::Unparseable);
    };
    let Some(obj) = value.as_object() else {
        return Inbound::Ignored(IgnoreReason::NotEnvelope);
    };
    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Inbound::Ignored(IgnoreReason::NotEnvelope);
    }

    if let Some(id) = obj.get("id") {
        let Some(id) = id.as_u64() else {
            return Inbound::Ignored(IgnoreReason::ForeignId);
        };
        return Inbound::Response {
            id,
            outcome: response_outcome(obj),
        };
    }

    let is_push = obj
        .get("method")
        .and_then(Value::as_str)
        .is_some_and(is_subscription_method);
    if !is_push {
        return Inbound::Ignored(IgnoreReason::NotSubscription);
    }
    match obj.get("params") {
        Some(params) if !params.is_null() => Inbound::Push(params.clone()),
        _ => Inbound::Ignored(IgnoreReason::MissingParams),
    }
}

fn response_outcome(obj: &Map<String, Value>) -> Result<Value, JsonRpcError> {
    if let Ok(envelope) = serde_json::from_value::<ResponseEnvelope>(Value::Object(obj.clone())) {
        return envelope.into_result();
    }
    // the marker and id are already checked, so only a malformed error object gets here
    match obj.get("error") {
        Some(err) if !err.is_null() => Err(JsonRpcError {
            code: codes::INTERNAL_ERROR,
            message: err.to_string(),
            data: Some(err.clone()),
        }),
        _ => Ok(obj.get("result").cloned().unwrap_or(Value::Null)),
    }
}

/// Classify `raw` and apply it: settle the matching pending call or publish
/// the push. Listeners run before this returns.
pub fn route(raw: &str, table: &CorrelationTable, bus: &EventBus) -> Routed {
    match classify(raw) {
        Inbound::Response { id, outcome } => {
            let settled = match outcome {
                Ok(result) => table.resolve(id, result).then_some(Routed::Resolved(id)),
                Err(err) => table
                    .reject(id, ProviderError::Rpc(err))
                    .then_some(Routed::Rejected(id)),
            };
            settled.unwrap_or_else(|| {
                tracing::debug!(id, "dropping response with no pending call");
                Routed::Stale(id)
            })
        }
        Inbound::Push(params) => {
            let listeners = bus.emit(&ProviderEvent::Notification(params));
            tracing::trace!(listeners, "published subscription push");
            Routed::Published
        }
        Inbound::Ignored(reason) => {
            tracing::debug!(%reason, "ignoring inbound message");
            Routed::Ignored(reason)
        }
    }
}
