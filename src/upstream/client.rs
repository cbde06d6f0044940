//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Issue a single GET against the upstream API
//! - Capture status, body and the cache-relevant response headers
//! - Map client failures onto transport errors
//!
//! # Design Decisions
//! - No retries and no timeout here; both belong to the fetcher
//! - Inbound HEAD is still fetched with GET so the body can be cached

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{
    header::{self, InvalidHeaderValue},
    HeaderMap, HeaderValue, StatusCode,
};
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

/// Failure below the HTTP status level.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Response headers worth keeping alongside a cached payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub content_type: Option<HeaderValue>,
    pub etag: Option<HeaderValue>,
    pub last_modified: Option<HeaderValue>,
}

impl ResponseMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            content_type: headers.get(header::CONTENT_TYPE).cloned(),
            etag: headers.get(header::ETAG).cloned(),
            last_modified: headers.get(header::LAST_MODIFIED).cloned(),
        }
    }

    /// Copy the captured headers onto an outgoing response.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(v) = &self.content_type {
            headers.insert(header::CONTENT_TYPE, v.clone());
        }
        if let Some(v) = &self.etag {
            headers.insert(header::ETAG, v.clone());
        }
        if let Some(v) = &self.last_modified {
            headers.insert(header::LAST_MODIFIED, v.clone());
        }
    }
}

/// One upstream HTTP response, fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub meta: ResponseMeta,
    pub body: Bytes,
}

/// The upstream API as seen by the fetcher.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<UpstreamResponse, TransportError>;
}

/// `Upstream` backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get(&self, url: &Url, headers: HeaderMap) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let meta = ResponseMeta::from_headers(response.headers());
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(UpstreamResponse { status, meta, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

/// Full outbound header set: identity, content negotiation, and a
/// Referer/Origin pair matching the upstream site.
pub fn build_base_headers(config: &UpstreamConfig, base: &Url) -> Result<HeaderMap, InvalidHeaderValue> {
    let origin = base.origin().ascii_serialization();

    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)?,
    );
    headers.insert(header::REFERER, HeaderValue::from_str(&format!("{}/", origin))?);
    headers.insert(header::ORIGIN, HeaderValue::from_str(&origin)?);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(headers)
}

/// The reduced set tried when upstream rejects the full one.
pub fn minimal_headers(headers: &HeaderMap) -> HeaderMap {
    let mut minimal = HeaderMap::new();
    for name in [header::USER_AGENT, header::ACCEPT, header::ACCEPT_LANGUAGE] {
        if let Some(value) = headers.get(&name) {
            minimal.insert(name, value.clone());
        }
    }
    minimal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_headers_derive_origin() {
        let base = Url::parse("https://stats.example.com/api/").unwrap();
        let headers = build_base_headers(&UpstreamConfig::default(), &base).unwrap();

        assert_eq!(headers[header::ORIGIN], "https://stats.example.com");
        assert_eq!(headers[header::REFERER], "https://stats.example.com/");
        assert!(headers.contains_key(header::USER_AGENT));
    }

    #[test]
    fn test_minimal_headers_keep_three() {
        let base = Url::parse("https://stats.example.com/api/").unwrap();
        let full = build_base_headers(&UpstreamConfig::default(), &base).unwrap();
        let minimal = minimal_headers(&full);

        assert_eq!(minimal.len(), 3);
        assert!(minimal.contains_key(header::USER_AGENT));
        assert!(minimal.contains_key(header::ACCEPT));
        assert!(minimal.contains_key(header::ACCEPT_LANGUAGE));
        assert!(!minimal.contains_key(header::REFERER));
    }

    #[test]
    fn test_meta_round_trips_onto_response_headers() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        upstream.insert(header::SERVER, HeaderValue::from_static("edge"));

        let meta = ResponseMeta::from_headers(&upstream);
        let mut outgoing = HeaderMap::new();
        meta.apply(&mut outgoing);

        assert_eq!(outgoing[header::ETAG], "\"abc\"");
        assert_eq!(outgoing[header::CONTENT_TYPE], "application/json");
        assert!(!outgoing.contains_key(header::SERVER));
        assert!(!outgoing.contains_key(header::LAST_MODIFIED));
    }
}
