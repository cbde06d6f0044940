//! Rendering of pipeline results into HTTP responses.
//!
//! # Headers
//! - `X-Proxy-Cache: HIT|MISS` on every proxied response
//! - `X-Proxy-Stale: 1` when an older cached copy stands in for a failed fetch
//! - `X-Proxy-Default: <kind>` when a fabricated empty shape is served
//! - `X-Proxy-Upstream-Status` with the real upstream status whenever the
//!   response is not what upstream actually said
//!
//! HEAD bodies are stripped by the router, so one renderer serves both methods.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::http::error::ApiError;
use crate::proxy::{CachePolicy, CachedPayload, Resolution, Resolved, UpstreamFailure};
use crate::upstream::SchedulerError;

pub const X_PROXY_CACHE: HeaderName = HeaderName::from_static("x-proxy-cache");
pub const X_PROXY_STALE: HeaderName = HeaderName::from_static("x-proxy-stale");
pub const X_PROXY_DEFAULT: HeaderName = HeaderName::from_static("x-proxy-default");
pub const X_PROXY_UPSTREAM_STATUS: HeaderName = HeaderName::from_static("x-proxy-upstream-status");

const HIT: &str = "HIT";
const MISS: &str = "MISS";

/// Turn a pipeline run into the response sent to the client.
pub fn render(resolved: Resolved, policy: &CachePolicy) -> Response {
    let permanent = resolved.is_permanent_failure();
    let kind = resolved.kind;

    match resolved.resolution {
        Resolution::Fresh(payload) => payload_response(&payload, HIT, &policy.cache_control(kind)),
        Resolution::Fetched(payload) => payload_response(&payload, MISS, &policy.cache_control(kind)),
        Resolution::Stale { payload, failure } => {
            let mut response = payload_response(&payload, HIT, "no-cache");
            let headers = response.headers_mut();
            headers.insert(X_PROXY_STALE, HeaderValue::from_static("1"));
            if let Some(status) = failure.upstream_status() {
                headers.insert(X_PROXY_UPSTREAM_STATUS, HeaderValue::from(status.as_u16()));
            }
            response
        }
        Resolution::Default { body, upstream_status } => {
            let mut response = Json(body.as_ref()).into_response();
            let headers = response.headers_mut();
            headers.insert(X_PROXY_CACHE, HeaderValue::from_static(MISS));
            headers.insert(X_PROXY_DEFAULT, HeaderValue::from_static(kind.as_str()));
            headers.insert(X_PROXY_UPSTREAM_STATUS, HeaderValue::from(upstream_status.as_u16()));
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Resolution::Failed(failure) => failure_response(failure, permanent),
    }
}

fn payload_response(payload: &CachedPayload, cache: &'static str, cache_control: &str) -> Response {
    let mut response = Json(&payload.data).into_response();
    let headers = response.headers_mut();
    payload.meta.apply(headers);
    headers.insert(X_PROXY_CACHE, HeaderValue::from_static(cache));
    if let Ok(value) = HeaderValue::from_str(cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    response
}

fn failure_response(failure: UpstreamFailure, permanent: bool) -> Response {
    let upstream_status = failure.upstream_status();

    let mut response = match failure {
        // Upstream gave a definitive answer; pass it through untouched.
        UpstreamFailure::Status(upstream) if permanent => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            upstream.meta.apply(response.headers_mut());
            response
                .headers_mut()
                .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        UpstreamFailure::Scheduler(SchedulerError::QueueFull(_)) => ApiError::queue_full().into_response(),
        other => ApiError::upstream_failed(other.details()).into_response(),
    };

    let headers = response.headers_mut();
    headers.insert(X_PROXY_CACHE, HeaderValue::from_static(MISS));
    if let Some(status) = upstream_status {
        headers.insert(X_PROXY_UPSTREAM_STATUS, HeaderValue::from(status.as_u16()));
    }
    response
}

/// Status the client will see, for logging before the response is built.
pub fn client_status(resolved: &Resolved) -> StatusCode {
    match &resolved.resolution {
        Resolution::Failed(UpstreamFailure::Status(upstream)) if resolved.is_permanent_failure() => upstream.status,
        Resolution::Failed(UpstreamFailure::Scheduler(SchedulerError::QueueFull(_))) => StatusCode::SERVICE_UNAVAILABLE,
        Resolution::Failed(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    }
}
