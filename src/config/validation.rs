//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTLs inside the stale horizon)
//! - Check the upstream base URL and CORS origins are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match Url::parse(&config.upstream.base_url) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(ValidationError::new(
                    "upstream.base_url",
                    format!("unsupported scheme '{}'", url.scheme()),
                ));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new("upstream.base_url", "missing host"));
            }
        }
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if HeaderValue::from_str(&config.upstream.user_agent).is_err() {
        errors.push(ValidationError::new("upstream.user_agent", "not a valid header value"));
    }
    if HeaderValue::from_str(&config.upstream.accept_language).is_err() {
        errors.push(ValidationError::new("upstream.accept_language", "not a valid header value"));
    }
    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }
    if !(1..=10).contains(&config.upstream.attempts) {
        errors.push(ValidationError::new("upstream.attempts", "must be between 1 and 10"));
    }

    if config.scheduler.max_concurrent == 0 {
        errors.push(ValidationError::new("scheduler.max_concurrent", "must be at least 1"));
    }
    if config.scheduler.max_queue == 0 {
        errors.push(ValidationError::new("scheduler.max_queue", "must be at least 1"));
    }

    let retries = &config.retries;
    if retries.response_base_ms == 0 || retries.transport_base_ms == 0 {
        errors.push(ValidationError::new(
            "retries",
            "response_base_ms and transport_base_ms must be greater than 0",
        ));
    }
    let min_base = retries.response_base_ms.min(retries.transport_base_ms);
    if min_base > 0 && retries.max_jitter_ms >= min_base {
        // Delays only grow with the attempt index while jitter stays below one step.
        errors.push(ValidationError::new(
            "retries.max_jitter_ms",
            format!("must be below the smallest backoff step of {}ms", min_base),
        ));
    }

    let cache = &config.cache;
    if cache.max_entries == 0 {
        errors.push(ValidationError::new("cache.max_entries", "must be at least 1"));
    }
    let ttls = [
        ("cache.ttl_static_secs", cache.ttl_static_secs),
        ("cache.ttl_historical_secs", cache.ttl_historical_secs),
        ("cache.ttl_live_secs", cache.ttl_live_secs),
        ("cache.ttl_default_secs", cache.ttl_default_secs),
    ];
    for (field, ttl) in ttls {
        if ttl == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        } else if ttl > cache.stale_horizon_secs {
            errors.push(ValidationError::new(
                field,
                format!("exceeds the stale horizon of {}s", cache.stale_horizon_secs),
            ));
        }
    }

    for origin in &config.cors.allowed_origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not a valid origin", origin),
            ));
        }
    }

    if config.rate_limit.enabled && (config.rate_limit.requests_per_minute == 0 || config.rate_limit.burst == 0) {
        errors.push(ValidationError::new(
            "rate_limit",
            "requests_per_minute and burst must be positive when enabled",
        ));
    }

    if config.aggregate.max_ids == 0 {
        errors.push(ValidationError::new("aggregate.max_ids", "must be at least 1"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
