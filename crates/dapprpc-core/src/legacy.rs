//! Callback-style adapter over [`Provider::request`] for code written against
//! the older `sendAsync(payload, callback)` shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::envelope::JSONRPC_VERSION;
use crate::error::ProviderError;
use crate::provider::Provider;

/// A full request payload as legacy callers build it. `id` and `jsonrpc` are
/// optional; the provider assigns its own wire id regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl LegacyPayload {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: None,
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Response handed to a legacy callback on success. `id` echoes the payload's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

impl Provider {
    /// Issue `payload` and report the outcome as `callback(error, response)`:
    /// `(None, Some(response))` on success, `(Some(error), None)` on failure.
    ///
    /// The callback runs on a spawned task; the returned handle completes once
    /// it has been called.
    pub fn request_callback<F>(&self, payload: LegacyPayload, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<ProviderError>, Option<LegacyResponse>) + Send + 'static,
    {
        let provider = self.clone();
        tokio::spawn(async move {
            let LegacyPayload { id, method, params, .. } = payload;
            match provider.request(&method, params).await {
                Ok(result) => callback(
                    None,
                    Some(LegacyResponse {
                        jsonrpc: JSONRPC_VERSION.into(),
                        id: id.unwrap_or(Value::Null),
                        result,
                    }),
                ),
                Err(err) => {
                    tracing::debug!(method = %method, error = %err, "legacy request failed");
                    callback(Some(err), None)
                }
            }
        })
    }
}
