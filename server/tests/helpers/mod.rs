//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum router,
//! plus a WebSocket observer client for end-to-end delivery tests.
//!
//! ## Test Servers
//!
//! Use [`spawn_test_server()`] when a test needs a real socket (WebSocket
//! observers) instead of `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use hooktap_server::api::{create_router, AppState};
use hooktap_server::config::Config;
use hooktap_server::ws::Hub;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub config: Arc<Config>,
    hub_task: JoinHandle<()>,
}

impl TestApp {
    /// Create a new test app with the default test config.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config.
    pub fn with_config(config: Config) -> Self {
        let (hub, hub_task) = Hub::spawn(64);
        let state = AppState::new(config, hub).expect("Failed to build app state");
        let router = create_router(state.clone());
        let config = Arc::clone(&state.config);

        Self {
            router,
            state,
            config,
            hub_task,
        }
    }

    /// Hub handle shared with the router.
    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build a webhook request addressed to `channel` by subdomain.
    pub fn webhook(&self, method: Method, channel: &str, uri: &str) -> http::request::Builder {
        Self::request(method, uri).header("host", format!("{channel}.{}", self.config.hook_domain))
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Serve this app on a real socket.
    pub async fn serve(&self) -> TestServer {
        spawn_test_server(self.router.clone()).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.hub_task.abort();
    }
}

// ============================================================================
// Test Server
// ============================================================================

/// A running test server bound to a random port.
pub struct TestServer {
    /// Server address (127.0.0.1:PORT).
    pub addr: SocketAddr,
    /// Base URL for HTTP requests (e.g., `http://127.0.0.1:12345`).
    pub url: String,
    /// Handle to the server task for cleanup.
    handle: JoinHandle<()>,
}

impl TestServer {
    /// WebSocket URL for observing `channel`.
    pub fn ws_url(&self, channel: &str) -> String {
        format!("ws://{}/ws/{channel}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a real HTTP server on a random port.
pub async fn spawn_test_server(router: Router) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local addr");
    let url = format!("http://{addr}");

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    TestServer {
        addr,
        url,
        handle,
    }
}

// ============================================================================
// Observer client
// ============================================================================

/// A WebSocket observer connected to one channel.
pub struct Observer {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Observer {
    /// Connect to `channel` and wait until the hub has registered it.
    pub async fn connect(server: &TestServer, hub: &Hub, channel: &str) -> Self {
        let (socket, _) = connect_async(server.ws_url(channel))
            .await
            .expect("WebSocket connect failed");
        wait_for_channel(hub, channel, true).await;
        Self { socket }
    }

    /// Next text frame split into its payloads, answering pings on the way.
    pub async fn next_payloads(&mut self) -> Vec<serde_json::Value> {
        let frame = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.socket.next().await {
                    Some(Ok(Message::Text(text))) => return text.to_string(),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = self.socket.send(Message::Pong(data)).await;
                    }
                    Some(Ok(_)) => {}
                    other => panic!("Observer stream ended: {other:?}"),
                }
            }
        })
        .await
        .expect("Timed out waiting for a frame");

        frame
            .split('\n')
            .filter(|p| !p.is_empty())
            .map(|p| serde_json::from_str(p).expect("Frame payload is not JSON"))
            .collect()
    }

    /// Wait for the server to close this observer.
    pub async fn expect_close(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match self.socket.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await
        .expect("Timed out waiting for close");
    }

    /// Send a text frame to the server.
    pub async fn send_text(&mut self, text: String) {
        self.socket
            .send(Message::Text(text.into()))
            .await
            .expect("Failed to send text frame");
    }

    /// Close from the client side.
    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}

/// Poll the hub until `channel` is (or is no longer) observed.
pub async fn wait_for_channel(hub: &Hub, channel: &str, present: bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while hub.contains(channel).await != present {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timed out waiting for channel {channel} present={present}"));
}

// ============================================================================
// Body helpers
// ============================================================================

/// Collect a response body into a string.
pub async fn body_to_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
