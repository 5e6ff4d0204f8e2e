//! Upstream JSON-RPC invoker with retries and failure classification.
//!
//! # Responsibilities
//! - Validate the target identifier before building an endpoint URL
//! - Send one logical call as up to `max_attempts` HTTP attempts
//! - Classify every failed attempt and back off between transient ones
//! - Treat an error object inside a 2xx body as a permanent failure

use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::blockchain::types::{RequestEnvelope, RpcError, RpcResult, UpstreamResponse};
use crate::config::{RetryConfig, UpstreamConfig};
use crate::observability::metrics;
use crate::resilience::backoff::{parse_retry_after, BackoffScheduler};
use crate::resilience::classifier::ClassifiedFailure;
use crate::resilience::retries::{RetryDecision, RetryState};

/// Executes logical upstream calls.
///
/// Holds no per-call state; the only shared mutation is the request id
/// counter, so one invoker serves every session.
pub struct RpcInvoker {
    http: reqwest::Client,
    url_template: String,
    api_key: String,
    allowed_targets: BTreeSet<String>,
    default_target: String,
    client_header: HeaderName,
    client_id: HeaderValue,
    max_attempts: u32,
    backoff: BackoffScheduler,
    next_id: AtomicU64,
}

impl RpcInvoker {
    /// Create an invoker from the upstream and retry configuration.
    pub fn new(upstream: &UpstreamConfig, retries: &RetryConfig) -> RpcResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(upstream.timeout_secs))
            .build()
            .map_err(|e| RpcError::Setup(e.to_string()))?;

        let client_header = HeaderName::from_bytes(upstream.client_header.as_bytes())
            .map_err(|e| RpcError::Setup(format!("invalid client header name: {e}")))?;
        let client_id = HeaderValue::from_str(&upstream.client_id)
            .map_err(|e| RpcError::Setup(format!("invalid client id: {e}")))?;

        Ok(Self {
            http,
            url_template: upstream.url_template.clone(),
            api_key: upstream.api_key.clone(),
            allowed_targets: upstream.allowed_targets.iter().cloned().collect(),
            default_target: upstream.default_target.clone(),
            client_header,
            client_id,
            max_attempts: retries.max_attempts.max(1),
            backoff: BackoffScheduler::new(Duration::from_millis(retries.initial_delay_ms)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Target used when a caller does not name one.
    pub fn default_target(&self) -> &str {
        &self.default_target
    }

    /// Targets callers may select.
    pub fn allowed_targets(&self) -> impl Iterator<Item = &str> {
        self.allowed_targets.iter().map(String::as_str)
    }

    /// Attempts per logical call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Build the endpoint for an allowlisted target.
    pub fn endpoint(&self, target: &str) -> RpcResult<Url> {
        if !self.allowed_targets.contains(target) {
            return Err(RpcError::Validation(format!(
                "unknown target '{target}'; expected one of: {}",
                self.allowed_targets().collect::<Vec<_>>().join(", ")
            )));
        }

        let raw = self
            .url_template
            .replace("{target}", target)
            .replace("{api_key}", &self.api_key);
        Url::parse(&raw).map_err(|e| RpcError::Setup(format!("invalid endpoint for '{target}': {e}")))
    }

    /// Run one logical call against `target`.
    ///
    /// Dropping the returned future aborts the in-flight attempt and
    /// schedules no further ones.
    pub async fn invoke(&self, method: &str, params: Vec<Value>, target: &str) -> RpcResult<Value> {
        if method.trim().is_empty() {
            return Err(RpcError::Validation("method name must not be empty".to_string()));
        }
        let url = self.endpoint(target)?;
        let envelope = RequestEnvelope::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        );

        let mut state = RetryState::new(self.max_attempts);
        loop {
            let attempt = state.attempt();
            match self.attempt_once(&url, &envelope).await {
                Ok(result) => {
                    tracing::debug!(
                        method = %envelope.method,
                        target = %target,
                        id = envelope.id,
                        attempt,
                        "Upstream call succeeded"
                    );
                    metrics::record_upstream_attempt(&envelope.method, "success");
                    return Ok(result);
                }
                Err(failure) => {
                    tracing::warn!(
                        method = %envelope.method,
                        target = %target,
                        id = envelope.id,
                        attempt,
                        category = %failure.category,
                        status = ?failure.status,
                        "Upstream attempt failed"
                    );
                    metrics::record_upstream_attempt(&envelope.method, failure.category.as_str());

                    match state.record_failure(failure, &self.backoff) {
                        RetryDecision::RetryAfter(delay) => {
                            tracing::info!(
                                method = %envelope.method,
                                attempt = state.attempt(),
                                delay = ?delay,
                                "Retrying upstream call"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::GiveUp(failure) => {
                            metrics::record_upstream_failure(failure.category.as_str());
                            return Err(RpcError::Failed(failure));
                        }
                    }
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        url: &Url,
        envelope: &RequestEnvelope,
    ) -> Result<Value, ClassifiedFailure> {
        let response = self
            .http
            .post(url.clone())
            .header(self.client_header.clone(), self.client_id.clone())
            .json(envelope)
            .send()
            .await
            .map_err(|e| ClassifiedFailure::network(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            return Err(ClassifiedFailure::from_status(status.as_u16(), retry_after));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClassifiedFailure::network(describe_transport_error(&e)))?;
        let body: UpstreamResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ClassifiedFailure::protocol(format!("malformed response body: {e}")))?;

        if let Some(error) = body.error {
            return Err(ClassifiedFailure::protocol(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

/// Short description of a transport error without the request URL,
/// which carries the API key.
fn describe_transport_error(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_body() || err.is_decode() {
        "response body could not be read"
    } else {
        "request aborted"
    }
}

impl std::fmt::Debug for RpcInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcInvoker")
            .field("url_template", &self.url_template)
            .field("allowed_targets", &self.allowed_targets)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_invoker() -> RpcInvoker {
        let mut upstream = UpstreamConfig::default();
        upstream.api_key = "k3y".to_string();
        RpcInvoker::new(&upstream, &RetryConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoint_from_template() {
        let invoker = test_invoker();
        let url = invoker.endpoint("eth-mainnet").unwrap();
        assert_eq!(url.as_str(), "https://eth-mainnet.g.alchemy.com/v2/k3y");
    }

    #[test]
    fn test_endpoint_rejects_unlisted_target() {
        let invoker = test_invoker();
        let err = invoker.endpoint("evil.example.com/#").unwrap_err();
        assert!(matches!(err, RpcError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invoke_rejects_before_network() {
        let invoker = test_invoker();
        let err = invoker
            .invoke("eth_blockNumber", vec![], "not-a-network")
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Validation(_)));

        let err = invoker.invoke(" ", vec![], "eth-mainnet").await.unwrap_err();
        assert!(matches!(err, RpcError::Validation(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let invoker = test_invoker();
        assert!(!format!("{invoker:?}").contains("k3y"));
    }

    #[test]
    fn test_rejects_bad_client_header() {
        let mut upstream = UpstreamConfig::default();
        upstream.client_header = "bad header".to_string();
        let err = RpcInvoker::new(&upstream, &RetryConfig::default()).unwrap_err();
        assert!(matches!(err, RpcError::Setup(_)));
    }
}
