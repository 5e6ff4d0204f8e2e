//! Upstream failure classification.
//!
//! Maps a failure signal (HTTP status, transport error, JSON-RPC error
//! object) to a [`FailureCategory`] and a transience flag. The
//! category → transient mapping is fixed: callers never decide it.

use serde::Serialize;
use std::fmt;

/// Category of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    RateLimit,
    ServerError,
    AuthError,
    NotFound,
    ClientError,
    NetworkError,
    ProtocolError,
}

impl FailureCategory {
    /// Whether an unchanged retry may plausibly succeed.
    pub fn is_transient(self) -> bool {
        match self {
            FailureCategory::RateLimit
            | FailureCategory::ServerError
            | FailureCategory::NetworkError => true,
            FailureCategory::AuthError
            | FailureCategory::NotFound
            | FailureCategory::ClientError
            | FailureCategory::ProtocolError => false,
        }
    }

    /// Stable label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::RateLimit => "rate_limit",
            FailureCategory::ServerError => "server_error",
            FailureCategory::AuthError => "auth_error",
            FailureCategory::NotFound => "not_found",
            FailureCategory::ClientError => "client_error",
            FailureCategory::NetworkError => "network_error",
            FailureCategory::ProtocolError => "protocol_error",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category for a non-success HTTP status.
///
/// Unmapped statuses fall into the permanent `ClientError` branch.
pub fn classify_status(status: u16) -> FailureCategory {
    match status {
        429 => FailureCategory::RateLimit,
        500..=599 => FailureCategory::ServerError,
        401 | 403 => FailureCategory::AuthError,
        404 => FailureCategory::NotFound,
        _ => FailureCategory::ClientError,
    }
}

/// A failure with its category, transience and an actionable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedFailure {
    pub category: FailureCategory,
    pub transient: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
}

impl ClassifiedFailure {
    fn new(category: FailureCategory, message: String) -> Self {
        Self {
            category,
            transient: category.is_transient(),
            retry_after_seconds: None,
            status: None,
            message,
        }
    }

    /// Failure from a non-success HTTP response.
    pub fn from_status(status: u16, retry_after_seconds: Option<u64>) -> Self {
        let category = classify_status(status);
        let message = match category {
            FailureCategory::RateLimit => match retry_after_seconds {
                Some(secs) => format!(
                    "Upstream rate limit reached (HTTP 429); retry after {secs}s or reduce request volume"
                ),
                None => "Upstream rate limit reached (HTTP 429); reduce request volume and retry later".to_string(),
            },
            FailureCategory::ServerError => format!(
                "Upstream provider error (HTTP {status}); the provider may be degraded, try again shortly"
            ),
            FailureCategory::AuthError => format!(
                "Upstream rejected the credentials (HTTP {status}); check the configured API key and its permissions"
            ),
            FailureCategory::NotFound => {
                "Upstream endpoint not found (HTTP 404); check the target network name".to_string()
            }
            _ => format!("Upstream rejected the request (HTTP {status}); check the method and parameters"),
        };
        Self {
            retry_after_seconds,
            status: Some(status),
            ..Self::new(category, message)
        }
    }

    /// Failure before any response arrived (connect refused, timeout, reset).
    pub fn network(detail: impl fmt::Display) -> Self {
        Self::new(
            FailureCategory::NetworkError,
            format!("Could not reach the upstream provider ({detail}); check connectivity and try again"),
        )
    }

    /// Failure carried inside a successful transport response.
    pub fn protocol(detail: impl fmt::Display) -> Self {
        Self::new(
            FailureCategory::ProtocolError,
            format!("Upstream returned an error: {detail}"),
        )
    }

    /// Rewrite the message once the attempt budget is spent.
    pub fn exhausted(mut self, attempts: u32) -> Self {
        self.message = format!("{} (gave up after {attempts} attempts)", self.message);
        self
    }
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for ClassifiedFailure {}
