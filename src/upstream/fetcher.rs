//! Retrying fetcher: one logical upstream GET, several attempts.
//!
//! # Responsibilities
//! - Enforce a per-attempt timeout
//! - Retry 429, 5xx, transport errors and (on sensitive paths) 403
//! - Back off linearly with jitter between attempts
//! - Fall back to the minimal header set after a rejected attempt
//!
//! # Design Decisions
//! - Non-retryable statuses return immediately, success or not
//! - On exhaustion the last observed outcome is returned untouched
//! - No concurrency control here; callers go through the scheduler

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, StatusCode};
use tokio::time::Instant;
use url::Url;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::{is_retryable, status_class};
use crate::upstream::client::{minimal_headers, TransportError, Upstream, UpstreamResponse};

/// Transient record of one outbound call.
///
/// Only header names are kept; values never reach the logs.
#[derive(Debug)]
pub struct FetchAttempt {
    pub index: u32,
    pub url: Url,
    pub headers: Vec<HeaderName>,
    pub minimal_headers: bool,
    pub outcome: Result<StatusCode, TransportError>,
    pub elapsed: Duration,
}

impl FetchAttempt {
    fn new(
        index: u32,
        url: &Url,
        headers: Vec<HeaderName>,
        minimal_headers: bool,
        outcome: &Result<UpstreamResponse, TransportError>,
        elapsed: Duration,
    ) -> Self {
        Self {
            index,
            url: url.clone(),
            headers,
            minimal_headers,
            outcome: outcome.as_ref().map(|r| r.status).map_err(Clone::clone),
            elapsed,
        }
    }
}

/// Executes logical fetches against an [`Upstream`].
#[derive(Clone)]
pub struct Fetcher {
    upstream: Arc<dyn Upstream>,
    retry: RetryConfig,
    attempt_timeout: Duration,
    header_variation: bool,
}

impl Fetcher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        retry: RetryConfig,
        attempt_timeout: Duration,
        header_variation: bool,
    ) -> Self {
        Self {
            upstream,
            retry,
            attempt_timeout,
            header_variation,
        }
    }

    /// Fetch `url`, making at most `attempts` calls.
    ///
    /// Returns the first non-retryable response, or the last outcome once
    /// the budget is spent.
    pub async fn fetch(
        &self,
        url: &Url,
        base_headers: &HeaderMap,
        attempts: u32,
        sensitive: bool,
    ) -> Result<UpstreamResponse, TransportError> {
        let attempts = attempts.max(1);
        let mut use_minimal = false;
        let mut index = 0;

        loop {
            let headers = if use_minimal {
                minimal_headers(base_headers)
            } else {
                base_headers.clone()
            };

            let header_names: Vec<HeaderName> = headers.keys().cloned().collect();
            let started = Instant::now();
            let outcome = match tokio::time::timeout(self.attempt_timeout, self.upstream.get(url, headers)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.attempt_timeout)),
            };
            let attempt = FetchAttempt::new(index, url, header_names, use_minimal, &outcome, started.elapsed());
            tracing::debug!(url = %url, attempt = ?attempt, "Upstream attempt finished");

            let delay = match &outcome {
                Ok(response) => {
                    metrics::record_upstream_attempt(status_class(response.status));
                    use_minimal = self.header_variation && response.status == StatusCode::FORBIDDEN;
                    calculate_backoff(index, self.retry.response_base_ms, self.retry.max_jitter_ms)
                }
                Err(_) => {
                    metrics::record_upstream_attempt("transport");
                    calculate_backoff(index, self.retry.transport_base_ms, self.retry.max_jitter_ms)
                }
            };
            let retryable = match &outcome {
                Ok(response) => is_retryable(response.status, sensitive),
                Err(_) => true,
            };
            if !retryable {
                return outcome;
            }

            index += 1;
            if index >= attempts {
                match &outcome {
                    Ok(response) => tracing::warn!(url = %url, status = %response.status, attempts, "Upstream retries exhausted"),
                    Err(e) => tracing::warn!(url = %url, error = %e, attempts, "Upstream retries exhausted"),
                }
                return outcome;
            }

            tracing::info!(url = %url, attempt = index, delay = ?delay, minimal_headers = use_minimal, "Retrying upstream request");
            tokio::time::sleep(delay).await;
        }
    }
}
