//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration for networked mode.
    pub listener: ListenerConfig,

    /// Upstream JSON-RPC provider.
    pub upstream: UpstreamConfig,

    /// Retry configuration for upstream calls.
    pub retries: RetryConfig,

    /// Session limits and timers.
    pub sessions: SessionConfig,

    /// Host/origin checks, rate limiting and size limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,

    /// Path of the session endpoint.
    pub endpoint_path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            endpoint_path: "/mcp".to_string(),
        }
    }
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Endpoint template; `{target}` and `{api_key}` are substituted.
    pub url_template: String,

    /// Environment variable holding the provider API key.
    pub api_key_env: String,

    /// API key. Never read from the config file.
    #[serde(skip)]
    pub api_key: String,

    /// Target identifiers that may be substituted into the endpoint.
    pub allowed_targets: Vec<String>,

    /// Target used when a caller does not name one.
    pub default_target: String,

    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,

    /// Header identifying this relay to the provider.
    pub client_header: String,

    /// Value of `client_header`.
    pub client_id: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url_template: "https://{target}.g.alchemy.com/v2/{api_key}".to_string(),
            api_key_env: "CHAIN_RELAY_API_KEY".to_string(),
            api_key: String::new(),
            allowed_targets: [
                "eth-mainnet",
                "eth-sepolia",
                "base-mainnet",
                "base-sepolia",
                "arb-mainnet",
                "opt-mainnet",
                "polygon-mainnet",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            default_target: "eth-mainnet".to_string(),
            timeout_secs: 30,
            client_header: "x-client-id".to_string(),
            client_id: concat!("chain-relay/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds; doubles per attempt.
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
        }
    }
}

/// Session registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum concurrent sessions (memory bound).
    pub max_sessions: usize,

    /// Idle time after which a session is evicted, in seconds.
    pub idle_timeout_secs: u64,

    /// Interval between sweeps, in seconds.
    pub sweep_interval_secs: u64,

    /// Interval between heartbeat frames on push streams, in seconds.
    pub heartbeat_interval_secs: u64,

    /// Serialize requests addressed to the same session.
    pub serialize_requests: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            idle_timeout_secs: 30 * 60,
            sweep_interval_secs: 60,
            heartbeat_interval_secs: 30,
            serialize_requests: false,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 20,
            burst_size: 40,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Accepted `Host` header values. Empty accepts any host.
    pub allowed_hosts: Vec<String>,

    /// Accepted `Origin` header values. Empty accepts any origin.
    pub allowed_origins: Vec<String>,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Maximum characters of a formatted tool result.
    pub max_response_chars: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![
                "localhost".to_string(),
                "127.0.0.1".to_string(),
            ],
            allowed_origins: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            max_body_size: 1024 * 1024, // 1MB
            max_response_chars: 25_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
