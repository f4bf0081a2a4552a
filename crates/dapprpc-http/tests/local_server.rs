//! Provider over HTTP against a minimal in-process responder.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dapprpc_core::{Provider, ProviderError};
use dapprpc_http::HttpTransport;

/// Read one HTTP request and return its body.
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client hung up");
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(split) = text.find("\r\n\r\n") {
            let headers = text[..split].to_ascii_lowercase();
            let len: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            let body_start = split + 4;
            if buf.len() >= body_start + len {
                return String::from_utf8(buf[body_start..body_start + len].to_vec()).unwrap();
            }
        }
    }
}

/// Serve `count` requests, answering each with `respond(request)`.
async fn responder(count: usize, respond: fn(&Value) -> (u16, String)) -> String {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    tokio::spawn(async move {
        for _ in 0..count {
            let (mut stream, _) = tcp.accept().await.unwrap();
            let body = read_request(&mut stream).await;
            let req: Value = serde_json::from_str(&body).unwrap();
            let (status, reply) = respond(&req);
            let head = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn response_body_resolves_the_request() {
    let url = responder(1, |req| {
        assert_eq!(req["method"], "eth_chainId");
        (200, json!({"jsonrpc": "2.0", "id": req["id"], "result": "0x89"}).to_string())
    })
    .await;
    let provider = Provider::with_transport(Arc::new(HttpTransport::default_for(url).unwrap()));
    provider.connect().await.unwrap();

    let result = provider.request("eth_chainId", json!([])).await.unwrap();
    assert_eq!(result, json!("0x89"));
    assert_eq!(provider.pending_count(), 0);
}

#[tokio::test]
async fn node_error_body_rejects() {
    let url = responder(1, |req| {
        let err = json!({"code": 4200, "message": "Unsupported Method"});
        (200, json!({"jsonrpc": "2.0", "id": req["id"], "error": err}).to_string())
    })
    .await;
    let provider = Provider::with_transport(Arc::new(HttpTransport::default_for(url).unwrap()));

    let err = provider.request("wallet_foo", json!([])).await.unwrap_err();
    assert_eq!(err.code(), 4200);
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let url = responder(1, |_| (503, "busy".to_string())).await;
    let provider = Provider::with_transport(Arc::new(HttpTransport::default_for(url).unwrap()));

    let err = provider.request("eth_chainId", json!([])).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
    assert!(err.message().contains("503"));
    assert_eq!(provider.pending_count(), 0);
}
