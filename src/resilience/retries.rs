//! Retry classification.
//!
//! # Design Decisions
//! - 429 and any 5xx are transient
//! - 403 is transient only on sensitive paths, where edge protection
//!   rejects session-bound endpoints intermittently
//! - Everything else is final and returned to the caller as-is

use axum::http::StatusCode;

/// Whether an upstream status should be retried.
pub fn is_retryable(status: StatusCode, sensitive: bool) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
        || (sensitive && status == StatusCode::FORBIDDEN)
}

/// Metric label for an upstream status.
pub fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
