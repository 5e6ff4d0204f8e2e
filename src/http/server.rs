//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create the Axum router for the endpoint and `/health`
//! - Wire up middleware (tracing, request id, host check, rate limit, body limit)
//! - Run the handshake: admit a session only after `initialize` succeeds
//! - Route follow-up traffic to the session's own handler
//! - Run the idle sweeper and terminate every session on shutdown

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::gateway::dispatch;
use crate::http::response::{rpc_error, rpc_response, session_error, with_session};
use crate::http::{sse, SESSION_HEADER};
use crate::protocol::handler::HandlerFactory;
use crate::protocol::jsonrpc::{parse_message, JsonRpcErrorObject, JsonRpcRequest, INVALID_REQUEST};
use crate::security::{host_check_middleware, rate_limit_middleware, HostPolicy, RateLimiterState};
use crate::sessions::{Clock, PendingSession, SessionError, SessionId, SessionRegistry, SweepTask, SystemClock};

const MODE: &str = "http";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub factory: Arc<dyn HandlerFactory>,
    pub heartbeat_interval: Duration,
    pub serialize_requests: bool,
}

/// HTTP server for the networked mode.
pub struct HttpServer {
    router: Router,
    registry: Arc<SessionRegistry>,
    sweep_interval: Duration,
}

impl HttpServer {
    /// Create a server using the system clock.
    pub fn new(config: &GatewayConfig, factory: Arc<dyn HandlerFactory>) -> Self {
        Self::with_clock(config, factory, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &GatewayConfig, factory: Arc<dyn HandlerFactory>, clock: Arc<dyn Clock>) -> Self {
        let registry = Arc::new(SessionRegistry::from_config(&config.sessions, clock));
        let state = AppState {
            registry: registry.clone(),
            factory,
            heartbeat_interval: Duration::from_secs(config.sessions.heartbeat_interval_secs),
            serialize_requests: config.sessions.serialize_requests,
        };

        let router = Self::build_router(config, state);
        Self {
            router,
            registry,
            sweep_interval: Duration::from_secs(config.sessions.sweep_interval_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let security = &config.security;
        let mut router = Router::new()
            .route(
                &config.listener.endpoint_path,
                get(stream_handler).post(post_handler).delete(delete_handler),
            )
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(security.max_body_size));

        if security.rate_limit.enabled {
            let limiter = Arc::new(RateLimiterState::from_config(&security.rate_limit));
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        router
            .layer(middleware::from_fn_with_state(
                HostPolicy::from_config(security),
                host_check_middleware,
            ))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The live session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// On shutdown every session is terminated first, which ends open push
    /// streams so the graceful drain can complete.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = SweepTask::start(self.registry.clone(), self.sweep_interval);
        let registry = self.registry.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                let closed = registry.terminate_all();
                tracing::info!(closed, "Shutdown signal received, sessions closed");
            })
            .await?;

        sweeper.shutdown().await;
        let late = self.registry.terminate_all();
        if late > 0 {
            tracing::info!(closed = late, "Closed sessions admitted during drain");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn session_token(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(SessionId::from)
}

/// POST: handshake without a token, dispatch with one.
async fn post_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match parse_message(&body) {
        Ok(request) => request,
        Err(error) => return rpc_error(StatusCode::BAD_REQUEST, None, error),
    };

    let Some(id) = session_token(&headers) else {
        if request.method == "initialize" {
            return handshake(&state, request).await;
        }
        tracing::debug!(method = %request.method, "Request without session token");
        return session_error(request.id, &SessionError::InvalidSession);
    };

    let Some(session) = state.registry.get(&id) else {
        tracing::debug!(session_id = %id, "Unknown or expired session");
        return session_error(request.id, &SessionError::InvalidSession);
    };
    state.registry.touch(&id);

    let response = if state.serialize_requests {
        let _ordered = session.dispatch_lock().lock().await;
        dispatch(session.handler().as_ref(), &request, MODE).await
    } else {
        dispatch(session.handler().as_ref(), &request, MODE).await
    };

    match response {
        Some(response) => rpc_response(StatusCode::OK, response),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Admit a new session once its handler acknowledges `initialize`.
async fn handshake(state: &AppState, request: JsonRpcRequest) -> Response {
    if request.is_notification() {
        return rpc_error(
            StatusCode::BAD_REQUEST,
            None,
            JsonRpcErrorObject::new(INVALID_REQUEST, "initialize must carry an id"),
        );
    }
    if !state.registry.has_capacity() {
        tracing::warn!(max_sessions = state.registry.max_sessions(), "Rejecting handshake at capacity");
        return session_error(
            request.id,
            &SessionError::CapacityExceeded {
                max: state.registry.max_sessions(),
            },
        );
    }

    let pending = PendingSession::new(state.factory.create());
    let handler = pending.handler().clone();
    let Some(response) = dispatch(handler.as_ref(), &request, MODE).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    if response.is_error() {
        tracing::debug!("Handshake rejected by handler");
        if let Err(e) = pending.release() {
            tracing::warn!(error = %e, "Failed to release rejected session");
        }
        return rpc_response(StatusCode::OK, response);
    }

    match state.registry.admit(pending) {
        Ok(session) => with_session(rpc_response(StatusCode::OK, response), session.id()),
        Err(e) => session_error(request.id, &e),
    }
}

/// GET: open the push stream of an existing session.
async fn stream_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = session_token(&headers).and_then(|id| state.registry.get(&id)) else {
        return session_error(None, &SessionError::InvalidSession);
    };
    state.registry.touch(session.id());

    match session.transport().attach_stream() {
        Some(push) => {
            tracing::debug!(session_id = %session.id(), "Push stream opened");
            sse::event_stream(push, state.heartbeat_interval).into_response()
        }
        None => session_error(None, &SessionError::InvalidSession),
    }
}

/// DELETE: terminate a session.
async fn delete_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(id) = session_token(&headers) else {
        return session_error(None, &SessionError::InvalidSession);
    };
    if state.registry.terminate(&id) {
        StatusCode::OK.into_response()
    } else {
        session_error(None, &SessionError::NotFound)
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sessions": state.registry.len(),
        "max_sessions": state.registry.max_sessions(),
    }))
}
