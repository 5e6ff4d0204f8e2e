//! Request dispatch onto a session handler.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::observability::metrics;
use crate::protocol::handler::SessionHandler;
use crate::protocol::jsonrpc::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR};

/// Run `request` through `handler`.
///
/// Returns `None` for notifications. Handler errors and panics become
/// error responses carrying the request id.
pub async fn dispatch(
    handler: &dyn SessionHandler,
    request: &JsonRpcRequest,
    mode: &'static str,
) -> Option<JsonRpcResponse> {
    metrics::record_request(mode, &request.method);

    let outcome = AssertUnwindSafe(handler.handle(request)).catch_unwind().await;
    let response = match outcome {
        Ok(Ok(result)) => JsonRpcResponse::success(request.id.clone(), result),
        Ok(Err(e)) => {
            tracing::debug!(method = %request.method, error = %e, "Handler returned an error");
            JsonRpcResponse::failure(request.id.clone(), e.to_error_object())
        }
        Err(_) => {
            tracing::error!(method = %request.method, "Handler panicked");
            JsonRpcResponse::failure(
                request.id.clone(),
                JsonRpcErrorObject::new(INTERNAL_ERROR, "Internal error"),
            )
        }
    };

    if request.is_notification() {
        if response.is_error() {
            tracing::debug!(method = %request.method, "Dropping error for notification");
        }
        return None;
    }
    Some(response)
}
