//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, CORS, rate limit, metrics)
//! - Own the proxy pipeline and its background cache purge
//! - Serve until the shutdown signal, then drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::{any, get},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::http::handlers::{self, AppState};
use crate::observability::metrics;
use crate::proxy::{Pipeline, ProxyError};
use crate::security::{cors_layer, rate_limit_middleware, RateLimiterState};
use crate::upstream::{HttpUpstream, Upstream};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// UUID v4 request ids for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// HTTP server for the caching proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pipeline: Arc<Pipeline>,
    limiter: Arc<RateLimiterState>,
}

impl HttpServer {
    /// Create a server talking to the real upstream API.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let upstream = Arc::new(HttpUpstream::new()?);
        Self::with_upstream(config, upstream)
    }

    /// Create a server over any [`Upstream`].
    pub fn with_upstream(config: ProxyConfig, upstream: Arc<dyn Upstream>) -> Result<Self, ServerError> {
        let pipeline = Arc::new(Pipeline::new(&config, upstream)?);
        let state = AppState {
            pipeline: pipeline.clone(),
            aggregate: config.aggregate.clone(),
        };

        let limiter = Arc::new(RateLimiterState::new(&config.rate_limit));
        let router = Self::build_router(&config, state, limiter.clone());
        Ok(Self {
            router,
            config,
            pipeline,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState, limiter: Arc<RateLimiterState>) -> Router {
        let api = Router::new()
            .route("/api", any(handlers::proxy_root))
            .route("/api/", any(handlers::proxy_root))
            .route("/api/aggregate/summary", any(handlers::aggregate_summary))
            .route("/api/aggregate/history", any(handlers::aggregate_history))
            .route("/api/{*path}", any(handlers::proxy))
            .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

        Router::new()
            .route("/healthz", get(handlers::healthz))
            .route("/readyz", get(handlers::readyz))
            .merge(api)
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(cors_layer(&config.cors))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let purge = spawn_purge_task(
            self.pipeline.clone(),
            self.limiter.clone(),
            Duration::from_secs(self.config.cache.purge_interval_secs),
            shutdown.resubscribe(),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        if let Some(purge) = purge {
            purge.abort();
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

/// Periodically drop cache entries older than the stale horizon and rate-limit
/// buckets idle for a whole interval. Disabled when `every` is zero.
fn spawn_purge_task(
    pipeline: Arc<Pipeline>,
    limiter: Arc<RateLimiterState>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = pipeline.cache().purge_expired(pipeline.policy().stale_horizon());
                    if removed > 0 {
                        tracing::debug!(removed, remaining = pipeline.cache().len(), "Purged expired cache entries");
                    }
                    let pruned = limiter.prune_idle(every);
                    if pruned > 0 {
                        tracing::debug!(pruned, remaining = limiter.tracked_clients(), "Pruned idle rate-limit buckets");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    }))
}
