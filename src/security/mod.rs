//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin gating, preflight answers)
//!     → rate_limit.rs (per-IP token bucket, /api/* only)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Health endpoints sit outside the rate limiter
//! - Rejections use the same JSON error shape as every other proxy error

pub mod cors;
pub mod rate_limit;

pub use cors::cors_layer;
pub use rate_limit::{rate_limit_middleware, RateLimiterState};
