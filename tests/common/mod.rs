//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use chain_relay::blockchain::RpcInvoker;
use chain_relay::config::GatewayConfig;
use chain_relay::protocol::{McpHandlerFactory, RelayTools};
use chain_relay::sessions::SessionRegistry;
use chain_relay::{HttpServer, Shutdown};

/// What the mock upstream answers for one request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
    pub retry_after: Option<String>,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn result(result: Value) -> Self {
        Self {
            status: 200,
            body: json!({"jsonrpc": "2.0", "id": 1, "result": result}),
            retry_after: None,
            delay: None,
        }
    }

    pub fn rpc_error(code: i64, message: &str) -> Self {
        Self {
            status: 200,
            body: json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}}),
            retry_after: None,
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({"error": "mock"}),
            retry_after: None,
            delay: None,
        }
    }

    pub fn with_retry_after(mut self, value: &str) -> Self {
        self.retry_after = Some(value.to_string());
        self
    }

    /// Hold the response back for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

type Responder = dyn Fn(usize, &Value) -> Reply + Send + Sync;

#[derive(Clone)]
struct MockState {
    responder: Arc<Responder>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

/// A programmable JSON-RPC upstream on loopback.
pub struct MockUpstream {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

impl MockUpstream {
    /// Number of HTTP requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bodies and headers of every request received.
    pub fn requests(&self) -> Vec<(HeaderMap, Value)> {
        self.requests.lock().unwrap().clone()
    }

    /// URL template routing every target to this mock.
    pub fn url_template(&self) -> String {
        format!("http://{}/{{target}}/{{api_key}}", self.addr)
    }
}

/// Start a mock whose replies come from `responder(call_index, body)`.
pub async fn start_upstream<F>(responder: F) -> MockUpstream
where
    F: Fn(usize, &Value) -> Reply + Send + Sync + 'static,
{
    let state = MockState {
        responder: Arc::new(responder),
        calls: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let calls = state.calls.clone();
    let requests = state.requests.clone();

    let app = Router::new()
        .route("/{*path}", post(mock_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, calls, requests }
}

async fn mock_handler(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let index = state.calls.fetch_add(1, Ordering::SeqCst);
    let reply = (state.responder)(index, &body);
    state.requests.lock().unwrap().push((headers, body));
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(reply.status).unwrap();
    let mut response = (status, Json(reply.body)).into_response();
    if let Some(retry_after) = reply.retry_after {
        response
            .headers_mut()
            .insert("retry-after", HeaderValue::from_str(&retry_after).unwrap());
    }
    response
}

/// Gateway config pointed at `upstream` with fast retries.
pub fn gateway_config(upstream: &MockUpstream) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.url_template = upstream.url_template();
    config.upstream.api_key = "test-key".to_string();
    config.retries.initial_delay_ms = 10;
    config.security.rate_limit.enabled = false;
    config
}

/// A running gateway on loopback.
pub struct TestGateway {
    pub base: String,
    pub registry: Arc<SessionRegistry>,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

impl TestGateway {
    pub fn endpoint(&self) -> String {
        format!("{}/mcp", self.base)
    }
}

/// Start the HTTP gateway with `config`.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let invoker = Arc::new(RpcInvoker::new(&config.upstream, &config.retries).unwrap());
    let tools = Arc::new(RelayTools::new(invoker, config.security.max_response_chars));
    let factory = Arc::new(McpHandlerFactory::new(tools));

    let server = HttpServer::new(&config, factory);
    let registry = server.registry();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(20)).await;

    TestGateway {
        base: format!("http://{addr}"),
        registry,
        shutdown,
        handle,
    }
}

pub fn initialize_body(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "0"}
        }
    })
}
