//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, budgets > 0)
//! - Check the upstream template and target allowlist agree
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if !config.listener.endpoint_path.starts_with('/') {
        errors.push(ValidationError::new("listener.endpoint_path", "must start with '/'"));
    }

    let upstream = &config.upstream;
    if !upstream.url_template.contains("{target}") {
        errors.push(ValidationError::new(
            "upstream.url_template",
            "must contain the {target} placeholder",
        ));
    }
    if upstream.allowed_targets.is_empty() {
        errors.push(ValidationError::new("upstream.allowed_targets", "must not be empty"));
    }
    for target in &upstream.allowed_targets {
        let well_formed = !target.is_empty()
            && target
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !well_formed {
            errors.push(ValidationError::new(
                "upstream.allowed_targets",
                format!("'{target}' may only contain letters, digits, '-' and '_'"),
            ));
        }
    }
    if !upstream.allowed_targets.contains(&upstream.default_target) {
        errors.push(ValidationError::new(
            "upstream.default_target",
            format!("'{}' is not in allowed_targets", upstream.default_target),
        ));
    }
    if upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }
    if upstream.client_header.is_empty() {
        errors.push(ValidationError::new("upstream.client_header", "must not be empty"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }

    let sessions = &config.sessions;
    if sessions.max_sessions == 0 {
        errors.push(ValidationError::new("sessions.max_sessions", "must be at least 1"));
    }
    if sessions.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("sessions.idle_timeout_secs", "must be greater than 0"));
    }
    if sessions.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("sessions.sweep_interval_secs", "must be greater than 0"));
    }
    if sessions.heartbeat_interval_secs == 0 {
        errors.push(ValidationError::new(
            "sessions.heartbeat_interval_secs",
            "must be greater than 0",
        ));
    }

    let security = &config.security;
    if security.rate_limit.enabled && security.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::new(
            "security.rate_limit.requests_per_second",
            "must be greater than 0 when rate limiting is enabled",
        ));
    }
    if security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }
    if security.max_response_chars == 0 {
        errors.push(ValidationError::new("security.max_response_chars", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
