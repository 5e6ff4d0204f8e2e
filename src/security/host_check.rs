//! Host and Origin allowlist middleware.
//!
//! Rejects requests whose `Host` header (port stripped) or `Origin` header
//! is not allowlisted. Guards the loopback listener against DNS rebinding.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::config::SecurityConfig;
use crate::observability::metrics;

/// Allowed `Host` and `Origin` values.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    allowed_hosts: Arc<Vec<String>>,
    allowed_origins: Arc<Vec<String>>,
}

impl HostPolicy {
    pub fn new(allowed_hosts: Vec<String>, allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_hosts: Arc::new(allowed_hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect()),
            allowed_origins: Arc::new(allowed_origins),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.allowed_hosts.clone(), config.allowed_origins.clone())
    }

    /// Check a raw `Host` header value.
    pub fn allows_host(&self, host: Option<&str>) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        match host {
            Some(host) => {
                let name = strip_port(host).to_ascii_lowercase();
                self.allowed_hosts.iter().any(|allowed| *allowed == name)
            }
            None => false,
        }
    }

    /// Check a raw `Origin` header value. Requests without one pass.
    pub fn allows_origin(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) if !self.allowed_origins.is_empty() => {
                self.allowed_origins.iter().any(|allowed| allowed == origin)
            }
            _ => true,
        }
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

pub async fn host_check_middleware(
    State(policy): State<HostPolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok());
    if !policy.allows_host(host) {
        tracing::warn!(host = ?host, "Rejected request with disallowed Host");
        metrics::record_rejected("host");
        return (StatusCode::FORBIDDEN, "Host not allowed").into_response();
    }

    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !policy.allows_origin(origin) {
        tracing::warn!(origin = ?origin, "Rejected request with disallowed Origin");
        metrics::record_rejected("origin");
        return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
    }

    next.run(request).await
}
