//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, CORS, rate limit)
//!     → handlers.rs (extract path/query, reject non-read methods)
//!     → [proxy pipeline decides cache / upstream / fallback]
//!     → response.rs (status, X-Proxy-* and caching headers)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod response;
pub mod server;

pub use error::ApiError;
pub use server::{HttpServer, ServerError};
