//! dapprpc CLI: talk to a node through the dapprpc provider.
//!
//! Usage:
//! ```bash
//! # Send a JSON-RPC call over WebSocket or HTTP
//! dapprpc call --url wss://ethereum-rpc.publicnode.com --method eth_chainId
//! dapprpc call --url https://cloudflare-eth.com --method eth_getBalance \
//!     --params '["0x0000000000000000000000000000000000000000","latest"]'
//!
//! # Subscribe and print pushes (WebSocket only)
//! dapprpc watch --url wss://ethereum-rpc.publicnode.com --kind newHeads --count 3
//!
//! # Print the status/error code tables
//! dapprpc codes
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use dapprpc_core::transport::Transport;
use dapprpc_core::{codes, listener, Provider, ProviderConfig, ProviderEvent, ReconnectConfig};
use dapprpc_http::HttpTransport;
use dapprpc_ws::WsTransport;

use crate::logging::{init_tracing, LogConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let log = LogConfig {
        level: parse_flag(&args, "--log-level").unwrap_or_else(|| LogConfig::default().level),
        json: has_flag(&args, "--json-logs"),
    };
    init_tracing(&log);

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "watch" => cmd_watch(&args[2..]).await,
        "codes" => {
            cmd_codes();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("dapprpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("dapprpc {}", env!("CARGO_PKG_VERSION"));
    println!("Call methods and watch subscriptions through a dapp provider\n");
    println!("USAGE:");
    println!("    dapprpc <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    call       Send one JSON-RPC request and print the result");
    println!("    watch      Subscribe (eth_subscribe) and print pushes");
    println!("    codes      Print provider error and close code tables");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("CALL FLAGS:");
    println!("    --url <URL>         ws://, wss://, http:// or https:// endpoint  [required]");
    println!("    --method <METHOD>   JSON-RPC method  [required]");
    println!("    --params <JSON>     JSON array of params  [default: []]");
    println!("    --timeout <SECS>    Give up after this many seconds  [default: 30]\n");
    println!("WATCH FLAGS:");
    println!("    --url <URL>         ws:// or wss:// endpoint  [required]");
    println!("    --kind <KIND>       Subscription kind  [default: newHeads]");
    println!("    --count <N>         Exit after N pushes  [default: unlimited]\n");
    println!("GLOBAL FLAGS:");
    println!("    --log-level <LVL>   trace | debug | info | warn | error  [default: warn]");
    println!("    --json-logs         Emit logs as JSON");
}

fn make_transport(url: &str) -> Result<Arc<dyn Transport>, String> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(Arc::new(WsTransport::default_for(url)))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Arc::new(HttpTransport::default_for(url).map_err(|e| e.to_string())?))
    } else {
        Err(format!("unsupported URL scheme: {url}"))
    }
}

async fn cmd_call(args: &[String]) -> Result<(), String> {
    let url = parse_flag(args, "--url").ok_or("--url is required")?;
    let method = parse_flag(args, "--method").ok_or("--method is required")?;
    let params: Value = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| format!("--params: {e}"))?,
        None => Value::Array(vec![]),
    };
    let timeout = parse_flag(args, "--timeout")
        .map(|s| s.parse::<u64>().map_err(|e| format!("--timeout: {e}")))
        .transpose()?
        .unwrap_or(30);

    let provider = Provider::new(
        make_transport(&url)?,
        ProviderConfig {
            request_timeout: Some(Duration::from_secs(timeout)),
            reconnect: ReconnectConfig::disabled(),
            ..Default::default()
        },
    );
    tracing::info!(url = %url, transport = provider.transport_name(), "connecting");
    provider.connect().await.map_err(|e| e.to_string())?;

    tracing::debug!(method = %method, timeout_secs = timeout, "sending request");
    let result = provider.request(&method, params).await.map_err(|e| {
        tracing::warn!(method = %method, code = e.code(), error = %e, "request failed");
        match e.data() {
            Some(data) => format!("{} (code {}, data {data})", e.message(), e.code()),
            None => format!("{} (code {})", e.message(), e.code()),
        }
    })?;
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());

    let _ = provider.disconnect().await;
    Ok(())
}

async fn cmd_watch(args: &[String]) -> Result<(), String> {
    let url = parse_flag(args, "--url").ok_or("--url is required")?;
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        return Err("watch needs a ws:// or wss:// URL".into());
    }
    let kind = parse_flag(args, "--kind").unwrap_or_else(|| "newHeads".into());
    let count = parse_flag(args, "--count")
        .map(|s| s.parse::<usize>().map_err(|e| format!("--count: {e}")))
        .transpose()?;

    let provider = Provider::new(
        make_transport(&url)?,
        ProviderConfig {
            reconnect: ReconnectConfig::disabled(),
            ..Default::default()
        },
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<ProviderEvent>();
    for channel in ["notification", "close"] {
        let tx = tx.clone();
        provider.on(channel, listener(move |e| {
            let _ = tx.send(e.clone());
        }));
    }

    tracing::info!(url = %url, "connecting");
    provider.connect().await.map_err(|e| e.to_string())?;
    let sub_id: String = provider
        .call("eth_subscribe", vec![Value::String(kind.clone())])
        .await
        .map_err(|e| e.to_string())?;
    tracing::info!(kind = %kind, subscription = %sub_id, "subscribed");
    eprintln!("Subscribed to {kind} ({sub_id}). Ctrl-C to stop.");

    let mut seen = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(seen, "interrupted");
                break;
            }
            ev = rx.recv() => match ev {
                Some(ProviderEvent::Notification(params)) => {
                    if params["subscription"].as_str() != Some(sub_id.as_str()) {
                        continue;
                    }
                    println!("{}", serde_json::to_string(&params["result"]).unwrap_or_default());
                    seen += 1;
                    if count.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
                Some(ProviderEvent::Close { code, reason }) => {
                    tracing::warn!(code, reason = %reason, seen, "connection closed while watching");
                    return Err(format!("connection closed ({code}): {reason}"));
                }
                Some(_) => {}
                None => break,
            }
        }
    }

    let _ = provider
        .request("eth_unsubscribe", Value::Array(vec![Value::String(sub_id)]))
        .await;
    let _ = provider.disconnect().await;
    Ok(())
}

fn cmd_codes() {
    println!("Provider error codes:\n");
    for code in [
        codes::USER_REJECTED_REQUEST,
        codes::UNAUTHORIZED,
        codes::UNSUPPORTED_METHOD,
        codes::DISCONNECTED,
        codes::CHAIN_DISCONNECTED,
        codes::PARSE_ERROR,
        codes::INVALID_REQUEST,
        codes::METHOD_NOT_FOUND,
        codes::INVALID_PARAMS,
        codes::INTERNAL_ERROR,
    ] {
        println!("  {code:>7}  {}", codes::error_description(code).unwrap_or_default());
    }
    println!("\nClose codes:\n");
    for code in 1000..=1015u16 {
        if let Some(desc) = codes::close_description(code) {
            println!("  {code:>7}  {desc}");
        }
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_are_parsed() {
        let a = args(&["--url", "ws://x", "--json-logs", "--count", "3"]);
        assert_eq!(parse_flag(&a, "--url").as_deref(), Some("ws://x"));
        assert_eq!(parse_flag(&a, "--count").as_deref(), Some("3"));
        assert!(parse_flag(&a, "--method").is_none());
        assert!(has_flag(&a, "--json-logs"));
    }

    #[test]
    fn transport_chosen_by_scheme() {
        assert_eq!(make_transport("ws://localhost:8546").unwrap().name(), "ws://localhost:8546");
        assert_eq!(make_transport("http://localhost:8545").unwrap().name(), "http://localhost:8545");
        assert!(make_transport("ipc:///tmp/geth.ipc").is_err());
    }
}
