//! JSON error bodies.
//!
//! Every error the proxy itself produces goes through [`ApiError`]:
//! `{"error": <message>, "details"?: <string>}` with `Cache-Control: no-store`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::proxy::ProxyError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")
    }

    pub fn upstream_failed(details: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "Upstream request failed").with_details(details)
    }

    pub fn queue_full() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Upstream queue full")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let is_method_error = self.status == StatusCode::METHOD_NOT_ALLOWED;
        let body = ErrorBody {
            error: self.message,
            details: self.details,
        };

        let mut response = (self.status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if is_method_error {
            headers.insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
        }
        response
    }
}

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            ProxyError::MethodNotAllowed(_) => Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
            ProxyError::Config(message) => {
                tracing::error!(error = %message, "Configuration error while serving request");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Method;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::upstream_failed("request timed out").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "error": "Upstream request failed", "details": "request timed out" })
        );
    }

    #[tokio::test]
    async fn test_proxy_error_mapping() {
        let response = ApiError::from(ProxyError::MethodNotAllowed(Method::POST)).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");

        let response = ApiError::from(ProxyError::validation("bad path")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"bad path"}"#);
    }
}
