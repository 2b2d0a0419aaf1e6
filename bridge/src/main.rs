//! FindMyFile bridge
//!
//! Exposes the client core to an out-of-process UI via JSON-RPC over
//! stdin/stdout. Requests are handled concurrently so a newer search can
//! supersede one still in flight; responses and notifications share one
//! writer so lines never interleave.

mod handlers;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::Instrument;

use findmyfile_lib::health::{BackendWatcher, HEALTH_TIMEOUT};
use findmyfile_lib::indexing::format_duration;
use findmyfile_lib::{AppState, ClientConfig};

// ============================================================================
// JSON-RPC Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: u64,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: u64, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

/// Server-initiated message (no id, no reply expected)
#[derive(Debug, Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
}

// ============================================================================
// Output
// ============================================================================

/// Cloneable handle onto the single stdout writer
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<String>,
}

impl Notifier {
    fn send_line<T: Serialize>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(line) => {
                if self.tx.send(line).is_err() {
                    log::debug!("Output closed, dropping message");
                }
            }
            Err(e) => log::error!("Failed to serialize outgoing message: {}", e),
        }
    }

    fn respond(&self, response: &JsonRpcResponse) {
        self.send_line(response);
    }

    pub fn notify(&self, method: &str, params: serde_json::Value) {
        self.send_line(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        });
    }
}

/// Drain queued lines into `out` until the channel closes or a write fails
async fn write_output<W: AsyncWrite + Unpin>(out: &mut W, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = out.write_all(line.as_bytes()).await {
            log::error!("Failed to write response: {}", e);
            break;
        }
        if let Err(e) = out.write_all(b"\n").await {
            log::error!("Failed to write response: {}", e);
            break;
        }
        if let Err(e) = out.flush().await {
            log::error!("Failed to flush stdout: {}", e);
            break;
        }
    }
}

// ============================================================================
// Bridge State
// ============================================================================

pub struct Bridge {
    pub state: AppState,
    pub notifier: Notifier,
    pub watcher: BackendWatcher,
}

/// Forward monitor snapshots and backend status changes as notifications
fn spawn_forwarders(bridge: &Arc<Bridge>) {
    let mut progress_rx = bridge.state.monitor().subscribe();
    let notifier = bridge.notifier.clone();
    tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let view = progress_rx.borrow_and_update().clone();
            let (eta, elapsed) = view
                .snapshot
                .as_ref()
                .map(|p| (format_duration(p.eta_seconds), format_duration(p.elapsed_seconds)))
                .unwrap_or_default();
            notifier.notify(
                "index.progress",
                serde_json::json!({ "view": view, "eta": eta, "elapsed": elapsed }),
            );
        }
    });

    let mut status_rx = bridge.watcher.subscribe();
    let notifier = bridge.notifier.clone();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            notifier.notify("backend.status", serde_json::json!(status));
        }
    });
}

// ============================================================================
// Main Loop
// ============================================================================

async fn process_request(bridge: Arc<Bridge>, request: JsonRpcRequest) -> JsonRpcResponse {
    match handlers::dispatch(&bridge, &request.method, request.params).await {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(e) => {
            log::warn!("{} failed: {:#}", request.method, e);
            JsonRpcResponse::error(request.id, -32000, format!("{:#}", e))
        }
    }
}

async fn run() -> Result<()> {
    let config = ClientConfig::load()?;
    let state = AppState::init(config)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        write_output(&mut stdout, rx).await;
    });
    let notifier = Notifier { tx };

    let watcher = BackendWatcher::spawn(
        Arc::clone(state.service()),
        state.config().status_interval(),
        state.config().service.health_timeout().min(HEALTH_TIMEOUT),
    );

    let bridge = Arc::new(Bridge {
        state,
        notifier: notifier.clone(),
        watcher,
    });
    spawn_forwarders(&bridge);

    // Pick up a job that was started before this process
    let resume = Arc::clone(&bridge);
    tokio::spawn(async move {
        let on_complete = handlers::completion_notifier(&resume);
        if let Err(e) = resume.state.resume_monitoring(Some(on_complete)).await {
            log::warn!("Could not check for a running indexing job: {}", e);
        }
    });

    log::info!("FindMyFile bridge ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read line: {}", e);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                log::error!("Failed to parse request: {}", e);
                notifier.respond(&JsonRpcResponse::error(0, -32700, format!("Parse error: {}", e)));
                continue;
            }
        };

        log::debug!("Received request: {} (id={})", request.method, request.id);
        let span = tracing::info_span!("rpc", method = %request.method, id = request.id);

        if request.method == "shutdown" {
            let response = process_request(Arc::clone(&bridge), request)
                .instrument(span)
                .await;
            notifier.respond(&response);
            break;
        }

        let bridge = Arc::clone(&bridge);
        let notifier = notifier.clone();
        tokio::spawn(
            async move {
                let response = process_request(bridge, request).await;
                notifier.respond(&response);
            }
            .instrument(span),
        );
    }

    bridge.state.shutdown();
    bridge.watcher.stop();
    drop(bridge);
    drop(notifier);

    // Let queued responses reach stdout; forwarder tasks may still hold
    // sender clones, so do not wait forever
    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), writer).await;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Logging goes to stderr; stdout is for JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("findmyfile_bridge=info,findmyfile_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    log::info!("FindMyFile bridge starting...");

    if let Err(e) = run().await {
        log::error!("Bridge failed: {:#}", e);
        std::process::exit(1);
    }

    log::info!("FindMyFile bridge shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts writes, fails every flush
    #[derive(Default)]
    struct ClosedPipe {
        written: Vec<u8>,
    }

    impl AsyncWrite for ClosedPipe {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader gone")))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_writer_stops_on_flush_failure() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("first".to_string()).unwrap();
        tx.send("second".to_string()).unwrap();
        drop(tx);

        let mut out = ClosedPipe::default();
        write_output(&mut out, rx).await;

        assert_eq!(out.written, b"first\n");
    }

    #[tokio::test]
    async fn test_writer_emits_one_line_per_message() {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Notifier { tx };
        notifier.respond(&JsonRpcResponse::success(7, serde_json::json!({ "ok": true })));
        notifier.notify("index.completed", serde_json::json!({ "processed": 3 }));
        drop(notifier);

        let mut out = Vec::new();
        write_output(&mut out, rx).await;

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(lines[0]).unwrap()["id"],
            7
        );
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(lines[1]).unwrap()["method"],
            "index.completed"
        );
    }
}
