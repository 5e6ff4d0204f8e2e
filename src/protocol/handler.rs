//! Per-session protocol handler.
//!
//! # Responsibilities
//! - Negotiate the protocol version on `initialize`
//! - Serve `ping`, `tools/list` and `tools/call`
//! - Map handler failures onto JSON-RPC error objects
//!
//! # Design Decisions
//! - Each session owns one handler; tools are shared behind an `Arc`
//! - Only `initialize` and `ping` are accepted before initialization
//! - `close` is fallible and a second call reports `Closed`

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::RpcError;
use crate::protocol::jsonrpc::{
    JsonRpcErrorObject, JsonRpcRequest, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, UPSTREAM_FAILED, UPSTREAM_RETRYABLE,
};
use crate::protocol::tools::{ToolDispatcher, ToolError};

/// Protocol versions this server speaks, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_NAME: &str = "chain-relay";

/// Errors a handler can return for a single request.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session not initialized")]
    NotInitialized,

    #[error("Handler already closed")]
    Closed,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// JSON-RPC error object for this failure.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            HandlerError::MethodNotFound(_) => {
                JsonRpcErrorObject::new(METHOD_NOT_FOUND, self.to_string())
            }
            HandlerError::InvalidParams(_) => JsonRpcErrorObject::new(INVALID_PARAMS, self.to_string()),
            HandlerError::InvalidRequest(_) | HandlerError::NotInitialized | HandlerError::Closed => {
                JsonRpcErrorObject::new(INVALID_REQUEST, self.to_string())
            }
            HandlerError::Tool(ToolError::UnknownTool(_) | ToolError::Validation(_))
            | HandlerError::Tool(ToolError::Rpc(RpcError::Validation(_))) => {
                JsonRpcErrorObject::new(INVALID_PARAMS, self.to_string())
            }
            HandlerError::Tool(ToolError::Rpc(RpcError::Failed(failure))) => {
                let code = if failure.transient {
                    UPSTREAM_RETRYABLE
                } else {
                    UPSTREAM_FAILED
                };
                JsonRpcErrorObject::new(code, failure.message.clone()).with_data(json!({
                    "category": failure.category,
                    "transient": failure.transient,
                    "retryable": failure.transient,
                    "retryAfterSeconds": failure.retry_after_seconds,
                    "status": failure.status,
                }))
            }
            HandlerError::Tool(ToolError::Rpc(RpcError::Setup(_))) | HandlerError::Internal(_) => {
                JsonRpcErrorObject::new(INTERNAL_ERROR, self.to_string())
            }
        }
    }
}

/// A session's protocol handler.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Handle one request or notification. The value is the `result` member.
    async fn handle(&self, request: &JsonRpcRequest) -> Result<Value, HandlerError>;

    /// Release the handler's resources.
    fn close(&self) -> Result<(), HandlerError>;
}

/// Builds one handler per session.
pub trait HandlerFactory: Send + Sync {
    fn create(&self) -> Arc<dyn SessionHandler>;
}

/// Handler for the tool protocol.
pub struct McpHandler {
    tools: Arc<dyn ToolDispatcher>,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl McpHandler {
    pub fn new(tools: Arc<dyn ToolDispatcher>) -> Self {
        Self {
            tools,
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn initialize(&self, params: Option<&Value>) -> Result<Value, HandlerError> {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
            _ => SUPPORTED_PROTOCOL_VERSIONS[0],
        };

        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HandlerError::InvalidRequest(
                "session already initialized".to_string(),
            ));
        }

        tracing::debug!(protocol_version = version, "Handshake accepted");
        Ok(json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))
    }

    async fn call_tool(&self, params: Option<&Value>) -> Result<Value, HandlerError> {
        let params = params
            .and_then(Value::as_object)
            .ok_or_else(|| HandlerError::InvalidParams("expected an object".to_string()))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidParams("'name' is required".to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let text = self.tools.call(name, arguments).await?;
        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": false,
        }))
    }
}

#[async_trait]
impl SessionHandler for McpHandler {
    async fn handle(&self, request: &JsonRpcRequest) -> Result<Value, HandlerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HandlerError::Closed);
        }

        match request.method.as_str() {
            "initialize" => return self.initialize(request.params.as_ref()),
            "ping" => return Ok(json!({})),
            "notifications/initialized" | "notifications/cancelled" => return Ok(Value::Null),
            _ => {}
        }

        if !self.is_initialized() {
            return Err(HandlerError::NotInitialized);
        }

        match request.method.as_str() {
            "tools/list" => Ok(json!({ "tools": self.tools.tools() })),
            "tools/call" => self.call_tool(request.params.as_ref()).await,
            other => Err(HandlerError::MethodNotFound(other.to_string())),
        }
    }

    fn close(&self) -> Result<(), HandlerError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(HandlerError::Closed);
        }
        Ok(())
    }
}

/// Factory producing [`McpHandler`]s over a shared tool set.
#[derive(Clone)]
pub struct McpHandlerFactory {
    tools: Arc<dyn ToolDispatcher>,
}

impl McpHandlerFactory {
    pub fn new(tools: Arc<dyn ToolDispatcher>) -> Self {
        Self { tools }
    }
}

impl HandlerFactory for McpHandlerFactory {
    fn create(&self) -> Arc<dyn SessionHandler> {
        Arc::new(McpHandler::new(self.tools.clone()))
    }
}
