//! Mock coordinator for integration tests.
//!
//! The HTTP side is a wiremock server answering the bootstrap call with the
//! URL of a local WebSocket server the test drives directly.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use remote_workers::codec::{self, Value};
use remote_workers::WorkerHost;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing_subscriber::EnvFilter;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Server side of one worker socket.
pub type ServerSocket = WebSocketStream<TcpStream>;

/// HTTP coordinator plus the socket listener its bootstrap points to.
pub struct MockCoordinator {
    pub http: MockServer,
    pub listener: TcpListener,
    pub ws_url: Url,
}

impl MockCoordinator {
    /// Starts a coordinator whose bootstrap answers with the socket URL.
    pub async fn start() -> Self {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let listener = TcpListener::bind(addr).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let ws_url = Url::parse(&format!("ws://127.0.0.1:{port}/worker")).unwrap();

        let http = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsworkers/v1/start"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ws_url": ws_url.as_str() })),
            )
            .expect(1)
            .mount(&http)
            .await;

        Self {
            http,
            listener,
            ws_url,
        }
    }

    /// Builds a remote-mode host pointed at this coordinator.
    pub fn host(&self) -> WorkerHost {
        WorkerHost::builder()
            .remote(Url::parse(&self.http.uri()).unwrap())
            .connect_timeout(WAIT)
            .http_timeout(WAIT)
            .build()
            .unwrap()
    }

    /// Accepts one worker socket and runs `script` on it.
    pub fn serve<F, Fut, T>(self, script: F) -> (MockServer, JoinHandle<T>)
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
        T: Send + 'static,
    {
        let listener = self.listener;
        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            script(ws).await
        });
        (self.http, handle)
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing once per test binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("remote_workers=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Sends one inbound message as a command frame plus a payload frame.
pub async fn push_message(ws: &mut ServerSocket, command: &str, value: &Value) {
    ws.send(Message::text(command)).await.unwrap();
    ws.send(Message::binary(codec::encode(value).unwrap()))
        .await
        .unwrap();
}

/// Reads client frames until `count` binary payloads arrived.
pub async fn read_payloads(ws: &mut ServerSocket, count: usize) -> Vec<Vec<u8>> {
    let mut payloads = Vec::with_capacity(count);
    while payloads.len() < count {
        match ws.next().await {
            Some(Ok(Message::Binary(bytes))) => payloads.push(bytes.to_vec()),
            Some(Ok(_)) => {}
            other => panic!("socket ended early: {other:?}"),
        }
    }
    payloads
}

/// Waits for the client to close the socket. Returns `true` on a close frame.
pub async fn wait_for_close(ws: &mut ServerSocket) -> bool {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Close(_)) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

/// Channel-backed callback recorder.
pub fn recorder() -> (
    impl Fn(&Value) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<Value>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |value: &Value| {
            let _ = tx.send(value.clone());
        },
        rx,
    )
}

/// Receives the next recorded value or panics after [`WAIT`].
pub async fn next_value(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a value")
        .expect("recorder dropped")
}
