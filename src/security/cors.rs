//! Cross-origin gating.
//!
//! Only configured origins get CORS headers back; a `*` entry opens the
//! proxy to any origin. Browsers enforce the rest.

use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;
use crate::http::response::{X_PROXY_CACHE, X_PROXY_DEFAULT, X_PROXY_STALE, X_PROXY_UPSTREAM_STATUS};

pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        // Validation already rejected origins that are not valid header values.
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::IF_NONE_MATCH])
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            X_PROXY_CACHE,
            X_PROXY_STALE,
            X_PROXY_DEFAULT,
            X_PROXY_UPSTREAM_STATUS,
            header::ETAG,
            header::LAST_MODIFIED,
        ])
        .max_age(Duration::from_secs(3600))
}
