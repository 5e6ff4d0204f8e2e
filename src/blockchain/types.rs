//! Upstream wire types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::resilience::classifier::ClassifiedFailure;

/// Fixed-shape JSON-RPC request sent to the upstream provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl RequestEnvelope {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// Error object returned by the provider inside a response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Body of an upstream response.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<UpstreamErrorObject>,
}

/// Errors that can occur during an upstream call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Caller input rejected before any network I/O. Never retried.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Classified upstream failure, surfaced after the retry policy ran.
    #[error(transparent)]
    Failed(#[from] ClassifiedFailure),

    /// The invoker could not be constructed.
    #[error("Upstream client setup failed: {0}")]
    Setup(String),
}

impl RpcError {
    /// The classified failure, if this error came from the upstream.
    pub fn failure(&self) -> Option<&ClassifiedFailure> {
        match self {
            RpcError::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result type for upstream operations.
pub type RpcResult<T> = Result<T, RpcError>;
