//! JSON-RPC 2.0 envelopes exchanged with the node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol marker carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Suffix of push-notification method names (`eth_subscription`, ...).
pub const SUBSCRIPTION_SUFFIX: &str = "_subscription";

/// An outgoing JSON-RPC 2.0 request. The `id` always matches a pending call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl RequestEnvelope {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response. An absent `id` means the message is a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl ResponseEnvelope {
    /// Successful response for `id`.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Error response for `id`.
    pub fn failure(id: u64, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }

    /// Unwrap the result value or return the error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// `params` of a subscription push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: Value,
}

/// A server push for an open subscription. Carries no `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPush {
    pub jsonrpc: String,
    pub method: String,
    pub params: SubscriptionParams,
}

impl SubscriptionPush {
    pub fn new(namespace: &str, subscription: impl Into<String>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: format!("{namespace}{SUBSCRIPTION_SUFFIX}"),
            params: SubscriptionParams {
                subscription: subscription.into(),
                result,
            },
        }
    }
}

/// Returns `true` if `method` names a subscription push.
pub fn is_subscription_method(method: &str) -> bool {
    method.len() > SUBSCRIPTION_SUFFIX.len() && method.ends_with(SUBSCRIPTION_SUFFIX)
}
