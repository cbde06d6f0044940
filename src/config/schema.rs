//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream API settings.
    pub upstream: UpstreamConfig,

    /// Upstream request scheduling (concurrency cap, spacing).
    pub scheduler: SchedulerConfig,

    /// Retry backoff configuration.
    pub retries: RetryConfig,

    /// Response cache and TTL classes.
    pub cache: CacheConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Per-IP rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Aggregate endpoint limits.
    pub aggregate: AggregateConfig,

    /// Fabricated payloads served when upstream denies access.
    pub structural_defaults: StructuralDefaultsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every `/api/<path>` is resolved against.
    pub base_url: String,

    /// User-Agent sent on every outbound call.
    pub user_agent: String,

    /// Accept-Language sent on every outbound call.
    pub accept_language: String,

    /// Ceiling for a single outbound HTTP call, in seconds.
    pub timeout_secs: u64,

    /// Attempt budget for one logical fetch.
    pub attempts: u32,

    /// Retry a 403 with the minimal header set.
    pub header_variation: bool,

    /// Append a trailing slash to forwarded paths.
    pub ensure_trailing_slash: bool,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fantasy.premierleague.com/api/".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36".to_string(),
            accept_language: "en-GB,en;q=0.9".to_string(),
            timeout_secs: 15,
            attempts: 3,
            header_variation: true,
            ensure_trailing_slash: true,
        }
    }
}

/// Upstream scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum in-flight upstream calls.
    pub max_concurrent: usize,

    /// Delay between a completion and the next dispatch on that slot.
    pub spacing_ms: u64,

    /// Maximum number of tasks waiting for a slot.
    pub max_queue: usize,
}

impl SchedulerConfig {
    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.spacing_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            spacing_ms: 150,
            max_queue: 1024,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Linear backoff step after a retryable response, in milliseconds.
    pub response_base_ms: u64,

    /// Linear backoff step after a transport error, in milliseconds.
    pub transport_base_ms: u64,

    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            response_base_ms: 500,
            transport_base_ms: 600,
            max_jitter_ms: 250,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses (LRU eviction beyond this).
    pub max_entries: usize,

    /// TTL for season-wide static resources.
    pub ttl_static_secs: u64,

    /// TTL for completed/historical resources.
    pub ttl_historical_secs: u64,

    /// TTL for live and per-gameweek resources.
    pub ttl_live_secs: u64,

    /// TTL for anything unclassified.
    pub ttl_default_secs: u64,

    /// How long an entry stays usable as a fallback.
    pub stale_horizon_secs: u64,

    /// Interval of the background purge; 0 disables it.
    pub purge_interval_secs: u64,
}

impl CacheConfig {
    pub fn stale_horizon(&self) -> Duration {
        Duration::from_secs(self.stale_horizon_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_static_secs: 3600,
            ttl_historical_secs: 300,
            ttl_live_secs: 30,
            ttl_default_secs: 60,
            stale_horizon_secs: 12 * 3600,
            purge_interval_secs: 300,
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to call the proxy from a browser. `*` allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per minute per IP.
    pub requests_per_minute: u32,

    /// Burst capacity.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 120,
            burst: 40,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Maximum identifiers accepted by one aggregate request.
    pub max_ids: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self { max_ids: 50 }
    }
}

/// Structural defaults per resource kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StructuralDefaultsConfig {
    /// Serve fabricated shapes at all.
    pub enabled: bool,

    /// Resource kinds with their fabricated body.
    pub shapes: Vec<StructuralShape>,
}

/// One row of the structural defaults table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuralShape {
    /// Resource kind name, e.g. `picks` or `entry_history`.
    pub kind: String,
    pub body: serde_json::Value,
}

impl Default for StructuralDefaultsConfig {
    fn default() -> Self {
        use serde_json::json;

        Self {
            enabled: true,
            shapes: vec![
                StructuralShape {
                    kind: "picks".into(),
                    body: json!({
                        "picks": [],
                        "entry_history": null,
                        "automatic_subs": [],
                        "active_chip": null
                    }),
                },
                StructuralShape {
                    kind: "live".into(),
                    body: json!({ "elements": [] }),
                },
                StructuralShape {
                    kind: "entry_history".into(),
                    body: json!({ "current": [], "past": [], "chips": [] }),
                },
                StructuralShape {
                    kind: "league_standings".into(),
                    body: json!({
                        "league": null,
                        "standings": { "has_next": false, "page": 1, "results": [] }
                    }),
                },
                StructuralShape {
                    kind: "transfers".into(),
                    body: json!([]),
                },
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [scheduler]
            max_concurrent = 2

            [cache]
            ttl_live_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.max_concurrent, 2);
        assert_eq!(config.scheduler.spacing_ms, 150);
        assert_eq!(config.cache.ttl_live_secs, 10);
        assert_eq!(config.cache.stale_horizon_secs, 43_200);
        assert_eq!(config.upstream.attempts, 3);
    }

    #[test]
    fn test_structural_shapes_from_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [structural_defaults]
            enabled = true

            [[structural_defaults.shapes]]
            kind = "live"
            body = { elements = [] }
            "#,
        )
        .unwrap();

        assert_eq!(config.structural_defaults.shapes.len(), 1);
        assert_eq!(config.structural_defaults.shapes[0].kind, "live");
        assert_eq!(
            config.structural_defaults.shapes[0].body,
            serde_json::json!({ "elements": [] })
        );
    }
}
