//! Response construction for the networked mode.
//!
//! # Design Decisions
//! - Handler failures are JSON-RPC errors inside an HTTP 200
//! - Session-level failures use HTTP status codes plus a JSON-RPC body

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::http::SESSION_HEADER;
use crate::protocol::jsonrpc::{
    JsonRpcErrorObject, JsonRpcResponse, RequestId, CAPACITY_EXCEEDED, INVALID_SESSION,
};
use crate::sessions::{SessionError, SessionId};

/// A JSON-RPC body with the given status.
pub fn rpc_response(status: StatusCode, body: JsonRpcResponse) -> Response {
    (status, Json(body)).into_response()
}

pub fn rpc_error(status: StatusCode, id: Option<RequestId>, error: JsonRpcErrorObject) -> Response {
    rpc_response(status, JsonRpcResponse::failure(id, error))
}

/// Map a session error onto its HTTP status and JSON-RPC code.
pub fn session_error(id: Option<RequestId>, error: &SessionError) -> Response {
    let (status, code) = match error {
        SessionError::CapacityExceeded { .. } => (StatusCode::SERVICE_UNAVAILABLE, CAPACITY_EXCEEDED),
        SessionError::InvalidSession => (StatusCode::BAD_REQUEST, INVALID_SESSION),
        SessionError::NotFound => (StatusCode::NOT_FOUND, INVALID_SESSION),
    };
    rpc_error(status, id, JsonRpcErrorObject::new(code, error.to_string()))
}

/// Attach the session token header.
pub fn with_session(mut response: Response, id: &SessionId) -> Response {
    match HeaderValue::from_str(id.as_str()) {
        Ok(value) => {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
        Err(e) => tracing::error!(session_id = %id, error = %e, "Session id is not a valid header value"),
    }
    response
}
