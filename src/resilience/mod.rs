//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt outcome from the fetcher:
//!     → retries.rs (is this outcome retryable for this path?)
//!     → backoff.rs (how long to wait before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Only GET is ever sent upstream, so every attempt is idempotent
//! - Jittered backoff prevents thundering herd across concurrent fetches
//! - Transport errors always retryable; 403 only on sensitive paths

pub mod backoff;
pub mod retries;
