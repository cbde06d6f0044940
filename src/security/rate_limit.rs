//! Per-IP rate limiting middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Untouched for `max_idle` and refilled to capacity: a fresh bucket would be identical.
    fn is_idle(&self, now: Instant, max_idle: Duration, capacity: f64, refill_rate: f64) -> bool {
        let idle = now.saturating_duration_since(self.last_update);
        idle >= max_idle && self.tokens + idle.as_secs_f64() * refill_rate >= capacity
    }
}

/// Buckets keyed by client IP.
pub struct RateLimiterState {
    buckets: DashMap<String, TokenBucket>,
    enabled: bool,
    /// Tokens per second.
    refill_rate: f64,
    burst: f64,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            enabled: config.enabled,
            refill_rate: f64::from(config.requests_per_minute) / 60.0,
            burst: f64::from(config.burst.max(1)),
        }
    }

    /// Take one token for `key`; false when the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_acquire(self.burst, self.refill_rate)
    }

    /// Drop buckets of clients that have gone quiet. Returns how many were removed.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_idle(now, max_idle, self.burst, self.refill_rate));
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Client key: the peer IP when the server runs with connect info, else a shared bucket.
fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware function for per-IP rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);

    if state.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::rate_limited().into_response()
    }
}
