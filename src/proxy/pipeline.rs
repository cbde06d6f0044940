//! Per-request proxy pipeline.
//!
//! # States
//! ```text
//! CacheCheck
//!   ├─ HIT  → Fresh
//!   └─ MISS → Dispatch (scheduler → fetcher) → UpstreamResult
//!               ├─ 2xx JSON → store → Fetched
//!               └─ failure  → StaleCheck
//!                               ├─ HIT  → Stale
//!                               └─ MISS → 403 with a configured shape? → Default
//!                                         otherwise → Failed
//! ```
//!
//! # Design Decisions
//! - Only this layer interprets upstream outcomes; the HTTP layer only renders them
//! - Stale data always beats surfacing a failure
//! - No request coalescing: concurrent misses on one URL fetch independently

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use url::Url;

use crate::cache::TtlCache;
use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::proxy::defaults::StructuralDefaults;
use crate::proxy::error::ProxyError;
use crate::proxy::policy::{CachePolicy, ResourceKind};
use crate::upstream::client::build_base_headers;
use crate::upstream::{
    Fetcher, ResponseMeta, Scheduler, SchedulerError, TransportError, Upstream, UpstreamResponse,
};

/// What the cache stores: the parsed upstream body plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    pub data: Value,
    pub meta: ResponseMeta,
}

/// Why a live fetch did not produce a cacheable payload.
#[derive(Debug)]
pub enum UpstreamFailure {
    /// Upstream answered, but not with 2xx (after any retries).
    Status(UpstreamResponse),
    /// 2xx whose body is not JSON.
    InvalidPayload { status: StatusCode, error: String },
    Transport(TransportError),
    Scheduler(SchedulerError),
}

impl UpstreamFailure {
    /// The real upstream status, when upstream answered at all.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(response) => Some(response.status),
            Self::InvalidPayload { status, .. } => Some(*status),
            Self::Transport(_) | Self::Scheduler(_) => None,
        }
    }

    /// Short description safe to show to clients.
    pub fn details(&self) -> String {
        match self {
            Self::Status(response) => format!("upstream responded with {}", response.status),
            Self::InvalidPayload { status, .. } => {
                format!("upstream responded with {} and a non-JSON body", status)
            }
            Self::Transport(e) => e.to_string(),
            Self::Scheduler(e) => e.to_string(),
        }
    }
}

/// Terminal state of one pipeline run.
#[derive(Debug)]
pub enum Resolution {
    /// Served from cache within ttl.
    Fresh(Arc<CachedPayload>),
    /// Fetched from upstream and stored.
    Fetched(Arc<CachedPayload>),
    /// Live fetch failed; an older copy within the stale horizon was used.
    Stale {
        payload: Arc<CachedPayload>,
        failure: UpstreamFailure,
    },
    /// Upstream refused access and nothing was cached; fabricated shape.
    Default {
        body: Arc<Value>,
        upstream_status: StatusCode,
    },
    Failed(UpstreamFailure),
}

impl Resolution {
    /// Payload data for the successful and degraded states.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Fresh(payload) | Self::Fetched(payload) | Self::Stale { payload, .. } => {
                Some(&payload.data)
            }
            Self::Default { body, .. } => Some(body.as_ref()),
            Self::Failed(_) => None,
        }
    }
}

/// A pipeline run together with the target it resolved.
#[derive(Debug)]
pub struct Resolved {
    pub kind: ResourceKind,
    pub url: Url,
    pub resolution: Resolution,
}

impl Resolved {
    /// Whether a failed status should be passed through verbatim
    /// (a client error other than 429) rather than reported as a gateway failure.
    pub fn is_permanent_failure(&self) -> bool {
        match &self.resolution {
            Resolution::Failed(UpstreamFailure::Status(response)) => {
                response.status.is_client_error() && response.status != StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Orchestrates cache, scheduler and fetcher for every proxied request.
pub struct Pipeline {
    base_url: Url,
    base_headers: HeaderMap,
    attempts: u32,
    ensure_trailing_slash: bool,
    cache: TtlCache<CachedPayload>,
    scheduler: Scheduler,
    fetcher: Arc<Fetcher>,
    policy: CachePolicy,
    defaults: StructuralDefaults,
}

impl Pipeline {
    /// Build the pipeline and its scheduler. Must be called from within a Tokio runtime.
    pub fn new(config: &ProxyConfig, upstream: Arc<dyn Upstream>) -> Result<Self, ProxyError> {
        let mut base = config.upstream.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| ProxyError::Config(format!("upstream.base_url: {}", e)))?;
        let base_headers = build_base_headers(&config.upstream, &base_url)
            .map_err(|e| ProxyError::Config(format!("upstream headers: {}", e)))?;

        let fetcher = Fetcher::new(
            upstream,
            config.retries.clone(),
            config.upstream.timeout(),
            config.upstream.header_variation,
        );

        Ok(Self {
            base_url,
            base_headers,
            attempts: config.upstream.attempts,
            ensure_trailing_slash: config.upstream.ensure_trailing_slash,
            cache: TtlCache::new(config.cache.max_entries),
            scheduler: Scheduler::new(&config.scheduler),
            fetcher: Arc::new(fetcher),
            policy: CachePolicy::from_config(&config.cache),
            defaults: StructuralDefaults::from_config(&config.structural_defaults)?,
        })
    }

    pub fn cache(&self) -> &TtlCache<CachedPayload> {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Normalize `path` (relative to the upstream base) and attach `query` verbatim.
    pub fn target(&self, path: &str, query: Option<&str>) -> Result<(ResourceKind, Url), ProxyError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(ProxyError::validation("missing upstream path"));
        }
        if segments.iter().any(|s| is_dot_segment(s)) {
            return Err(ProxyError::validation("path traversal is not allowed"));
        }
        if segments.iter().any(|s| s.contains(['?', '#', '\\'])) {
            return Err(ProxyError::validation("invalid character in path"));
        }

        let mut relative = segments.join("/");
        if self.ensure_trailing_slash || path.ends_with('/') {
            relative.push('/');
        }

        let mut url = self
            .base_url
            .join(&relative)
            .map_err(|e| ProxyError::validation(format!("invalid upstream path: {}", e)))?;
        if url.origin() != self.base_url.origin() || !url.path().starts_with(self.base_url.path()) {
            return Err(ProxyError::validation("path escapes the upstream base"));
        }
        url.set_query(query.filter(|q| !q.is_empty()));

        Ok((ResourceKind::classify(&relative), url))
    }

    /// Full pipeline for an inbound `/api/<path>?<query>`.
    pub async fn resolve(&self, path: &str, query: Option<&str>) -> Result<Resolved, ProxyError> {
        let (kind, url) = self.target(path, query)?;
        let resolution = self.resolve_url(kind, &url).await;
        Ok(Resolved { kind, url, resolution })
    }

    async fn resolve_url(&self, kind: ResourceKind, url: &Url) -> Resolution {
        let key = url.as_str();

        if let Some(payload) = self.cache.get_fresh(key) {
            tracing::debug!(url = %url, "Cache hit");
            metrics::record_cache_lookup("hit");
            return Resolution::Fresh(payload);
        }
        metrics::record_cache_lookup("miss");

        let failure = match self.fetch_scheduled(url.clone(), kind.is_sensitive()).await {
            Ok(response) if response.status.is_success() => {
                match serde_json::from_slice::<Value>(&response.body) {
                    Ok(data) => {
                        let payload = CachedPayload {
                            data,
                            meta: response.meta,
                        };
                        let stored = self.cache.put(key, payload, self.policy.ttl(kind));
                        tracing::debug!(url = %url, kind = %kind, "Cache filled");
                        return Resolution::Fetched(stored);
                    }
                    Err(e) => UpstreamFailure::InvalidPayload {
                        status: response.status,
                        error: e.to_string(),
                    },
                }
            }
            Ok(response) => UpstreamFailure::Status(response),
            Err(failure) => failure,
        };

        tracing::warn!(
            url = %url,
            status = ?failure.upstream_status().map(|s| s.as_u16()),
            details = %failure.details(),
            "Upstream fetch failed"
        );

        if let Some(payload) = self.cache.get_stale(key, self.policy.stale_horizon()) {
            tracing::info!(url = %url, "Serving stale cache entry");
            metrics::record_cache_lookup("stale");
            return Resolution::Stale { payload, failure };
        }

        if failure.upstream_status() == Some(StatusCode::FORBIDDEN) {
            if let Some(body) = self.defaults.shape_for(kind) {
                tracing::info!(url = %url, kind = %kind, "Serving structural default");
                metrics::record_cache_lookup("default");
                return Resolution::Default {
                    body,
                    upstream_status: StatusCode::FORBIDDEN,
                };
            }
        }

        Resolution::Failed(failure)
    }

    async fn fetch_scheduled(&self, url: Url, sensitive: bool) -> Result<UpstreamResponse, UpstreamFailure> {
        let fetcher = self.fetcher.clone();
        let headers = self.base_headers.clone();
        let attempts = self.attempts;

        let outcome = self
            .scheduler
            .schedule(move || async move { fetcher.fetch(&url, &headers, attempts, sensitive).await })
            .await;

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(UpstreamFailure::Transport(e)),
            Err(e) => Err(UpstreamFailure::Scheduler(e)),
        }
    }
}

/// `.` and `..`, including their percent-encoded spellings.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}
