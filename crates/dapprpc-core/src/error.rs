//! Error types surfaced by the provider and its transports.

use serde_json::Value;
use thiserror::Error;

use crate::codes;
use crate::envelope::JsonRpcError;

/// Errors raised by a concrete transport (socket, HTTP, in-memory).
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// HTTP request failed (connection refused, non-2xx status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The transport has no live connection to send on.
    #[error("transport not connected")]
    NotConnected,

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

/// Errors a `request` future can settle with.
///
/// Every variant exposes the `{code, message, data}` triple through
/// [`ProviderError::code`], [`ProviderError::message`] and [`ProviderError::data`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Malformed call arguments. Never sent over the wire.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The transport failed to deliver the request.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection closed while the call was pending.
    #[error("disconnected ({code}): {reason}")]
    Disconnected { code: u16, reason: String },

    /// No response within the configured request timeout.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The result could not be deserialized into the requested type.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The provider's driver has shut down.
    #[error("provider closed")]
    Closed,
}

impl ProviderError {
    /// Numeric error code for programmatic handling.
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidArgument(_) => codes::INVALID_PARAMS,
            Self::Rpc(e) => e.code,
            Self::Transport(_) | Self::Disconnected { .. } | Self::Closed => codes::DISCONNECTED,
            Self::Timeout { .. } | Self::Deserialization(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Human-readable message. For node errors this is the node's own message.
    pub fn message(&self) -> String {
        match self {
            Self::Rpc(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    /// Optional structured data attached by the node.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Rpc(e) => e.data.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` if the user declined the request (code 4001).
    pub fn is_user_rejection(&self) -> bool {
        self.code() == codes::USER_REJECTED_REQUEST
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rpc_error_exposes_node_fields() {
        let err = ProviderError::Rpc(JsonRpcError {
            code: 4100,
            message: "Unauthorized".into(),
            data: Some(json!({"method": "eth_accounts"})),
        });
        assert_eq!(err.code(), 4100);
        assert_eq!(err.message(), "Unauthorized");
        assert_eq!(err.data().unwrap()["method"], "eth_accounts");
    }

    #[test]
    fn validation_error_uses_invalid_params_code() {
        let err = ProviderError::InvalidArgument("method must be a non-empty string".into());
        assert_eq!(err.code(), -32602);
        assert!(err.data().is_none());
        assert!(err.message().contains("non-empty"));
    }

    #[test]
    fn user_rejection_detected() {
        let err = ProviderError::Rpc(JsonRpcError {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        });
        assert!(err.is_user_rejection());
        assert!(!ProviderError::Closed.is_user_rejection());
    }
}
