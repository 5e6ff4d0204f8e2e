//! Per-client rate limiting middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Tracked clients beyond which idle buckets are pruned on the next check.
const PRUNE_THRESHOLD: usize = 4096;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// True once the bucket would have refilled to capacity by `now`.
    fn is_full(&self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }
}

/// Buckets keyed by client IP.
#[derive(Debug)]
pub struct RateLimiterState {
    buckets: DashMap<IpAddr, TokenBucket>,
    rps: f64,
    burst: f64,
}

impl RateLimiterState {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: requests_per_second as f64,
            burst: burst_size.max(1) as f64,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        if self.buckets.len() > PRUNE_THRESHOLD {
            self.prune_idle(now);
        }
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(self.burst, now));
        bucket.try_acquire(self.burst, self.rps, now)
    }

    /// Drop buckets that have refilled to capacity.
    ///
    /// A full bucket is indistinguishable from a fresh one, so forgetting
    /// it does not change any later decision.
    pub fn prune_idle(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_full(self.burst, self.rps, now));
        let pruned = before.saturating_sub(self.buckets.len());
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.buckets.len(), "Pruned idle rate-limit buckets");
        }
        pruned
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Middleware function for per-IP rate limiting.
///
/// Requests without connection info (e.g. in-process routers) pass.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match client {
        Some(ip) if !state.check(ip) => {
            tracing::warn!(client = %ip, "Rate limit exceeded");
            metrics::record_rate_limited("rps_limit");
            (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
        }
        _ => next.run(request).await,
    }
}
