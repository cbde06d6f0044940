//! Errors raised before a request reaches the cache or the scheduler.

use axum::http::Method;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Missing or malformed input (path, `ids`, `gw`).
    #[error("{0}")]
    Validation(String),

    /// Only GET and HEAD are proxied.
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ProxyError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Reject anything but GET and HEAD.
pub fn ensure_read_only(method: &Method) -> Result<(), ProxyError> {
    if method == Method::GET || method == Method::HEAD {
        Ok(())
    } else {
        Err(ProxyError::MethodNotAllowed(method.clone()))
    }
}
