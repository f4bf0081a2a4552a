//! HTTP transport backed by `reqwest`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use dapprpc_core::codes;
use dapprpc_core::error::TransportError;
use dapprpc_core::transport::{InboundSink, Transport};

/// Configuration for `HttpTransport`.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Stateless HTTP transport: `connect` only flips the provider to connected.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    sink: Mutex<Option<InboundSink>>,
}

impl HttpTransport {
    /// Create a transport for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            sink: Mutex::new(None),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpTransportConfig::default())
    }

    fn sink(&self) -> Result<InboundSink, TransportError> {
        self.sink
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::Other("transport not bound to a provider".into()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn bind(&self, sink: InboundSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.sink()?.connected();
        Ok(())
    }

    async fn send(&self, message: String) -> Result<(), TransportError> {
        let sink = self.sink()?;
        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        tracing::trace!(url = %self.url, len = body.len(), "HTTP response received");
        sink.message(body);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink()?.closed(Some(codes::CLOSE_NORMAL), None);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.url
    }
}
