//! WebSocket transport backed by `tokio-tungstenite`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use dapprpc_core::codes;
use dapprpc_core::error::TransportError;
use dapprpc_core::transport::{InboundSink, Transport};

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct WsTransportConfig {
    /// Give up on the opening handshake after this long.
    pub connect_timeout: Duration,
}

impl Default for WsTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Command sent from callers to the connection task.
enum WsCommand {
    Send {
        text: String,
        ack: oneshot::Sender<Result<(), TransportError>>,
    },
    Close,
}

#[derive(Default)]
struct Connection {
    cmd_tx: Option<mpsc::UnboundedSender<WsCommand>>,
    /// `close` arrived while no socket was live; a handshake that finishes
    /// afterwards is dropped instead of reported.
    close_pending: bool,
}

/// WebSocket transport.
///
/// Each successful [`connect`](Transport::connect) spawns a task that owns the
/// socket until it closes; the close is then reported to the provider, which
/// decides whether to connect again.
pub struct WsTransport {
    url: String,
    config: WsTransportConfig,
    sink: Mutex<Option<InboundSink>>,
    conn: Mutex<Connection>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, config: WsTransportConfig) -> Self {
        Self {
            url: url.into(),
            config,
            sink: Mutex::new(None),
            conn: Mutex::new(Connection::default()),
        }
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Self {
        Self::new(url, WsTransportConfig::default())
    }

    fn live_sender(&self) -> Option<mpsc::UnboundedSender<WsCommand>> {
        self.conn
            .lock()
            .unwrap()
            .cmd_tx
            .as_ref()
            .filter(|tx| !tx.is_closed())
            .cloned()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(tx) = self.conn.lock().unwrap().cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn bind(&self, sink: InboundSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if self.live_sender().is_some() {
            return Ok(());
        }
        let sink = self
            .sink
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::Other("transport not bound to a provider".into()))?;

        self.conn.lock().unwrap().close_pending = false;

        tracing::info!(url = %self.url, "connecting via WebSocket");
        let (mut ws_stream, _) = time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        )
        .await
        .map_err(|_| {
            TransportError::WebSocket(format!(
                "connect timed out after {}ms",
                self.config.connect_timeout.as_millis()
            ))
        })?
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let closed_during_handshake = {
            let mut conn = self.conn.lock().unwrap();
            if conn.close_pending {
                conn.close_pending = false;
                true
            } else {
                conn.cmd_tx = Some(cmd_tx);
                false
            }
        };
        if closed_during_handshake {
            tracing::debug!(url = %self.url, "closed during handshake, dropping socket");
            let _ = ws_stream.close(None).await;
            return Ok(());
        }
        sink.connected();
        tokio::spawn(ws_task(self.url.clone(), ws_stream, cmd_rx, sink));
        Ok(())
    }

    async fn send(&self, message: String) -> Result<(), TransportError> {
        let tx = self.live_sender().ok_or(TransportError::NotConnected)?;
        let (ack, ack_rx) = oneshot::channel();
        tx.send(WsCommand::Send { text: message, ack })
            .map_err(|_| TransportError::NotConnected)?;
        ack_rx
            .await
            .map_err(|_| TransportError::WebSocket("connection task ended before send".into()))?
    }

    async fn close(&self) -> Result<(), TransportError> {
        let tx = {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.cmd_tx.take();
            conn.close_pending = tx.is_none();
            tx
        };
        match tx {
            Some(tx) => {
                let _ = tx.send(WsCommand::Close);
            }
            None => {
                // no live socket: still let the provider observe the close
                if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                    sink.closed(Some(codes::CLOSE_NORMAL), None);
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.url
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Owns one WebSocket connection until it closes, then reports the close.
async fn ws_task(
    url: String,
    ws_stream: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    sink: InboundSink,
) {
    let (mut ws_sink, mut stream) = ws_stream.split();

    let (code, reason): (Option<u16>, Option<String>) = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break (Some(codes::CLOSE_NORMAL), None);
                    }
                    Some(WsCommand::Send { text, ack }) => {
                        match ws_sink.send(Message::Text(text.into())).await {
                            Ok(()) => {
                                let _ = ack.send(Ok(()));
                            }
                            Err(e) => {
                                let reason = e.to_string();
                                let _ = ack.send(Err(TransportError::WebSocket(reason.clone())));
                                break (Some(codes::CLOSE_ABNORMAL), Some(reason));
                            }
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break (None, None),
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "WS receive error");
                        break (Some(codes::CLOSE_ABNORMAL), Some(e.to_string()));
                    }
                    Some(Ok(Message::Text(text))) => {
                        sink.message(text.as_str());
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            sink.message(text);
                        }
                        Err(_) => tracing::debug!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(f) => (Some(u16::from(f.code)), Some(f.reason.to_string())),
                            None => (Some(1005), None),
                        };
                    }
                    _ => {}
                }
            }
        }
    };

    tracing::warn!(url = %url, code = ?code, reason = ?reason, "WS disconnected");
    sink.closed(code, reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dapprpc_core::transport::TransportEvent;

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let transport = WsTransport::default_for("ws://127.0.0.1:1");
        let err = transport.send("{}".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn connect_without_provider_fails() {
        let transport = WsTransport::default_for("ws://127.0.0.1:1");
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::Other(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_a_websocket_error() {
        let transport = WsTransport::new(
            "ws://127.0.0.1:1",
            WsTransportConfig {
                connect_timeout: Duration::from_secs(2),
            },
        );
        let (sink, mut rx) = InboundSink::channel();
        transport.bind(sink);
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::WebSocket(_))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_when_idle_reports_normal_closure() {
        let transport = WsTransport::default_for("ws://127.0.0.1:1");
        let (sink, mut rx) = InboundSink::channel();
        transport.bind(sink);
        transport.close().await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::Closed {
                code: Some(1000),
                reason: None
            }
        );
    }
}
