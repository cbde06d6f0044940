//! Caching proxy core.
//!
//! # Data Flow
//! ```text
//! /api/<path>?<query>
//!     → pipeline.rs (normalize, classify via policy.rs)
//!     → cache (fresh?) → scheduler → fetcher
//!     → cache fill, or stale / defaults.rs fallback
//!     → Resolved, rendered by the HTTP layer
//! ```
//!
//! `aggregate.rs` fans several identifiers out over the same pipeline.

pub mod aggregate;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod policy;

pub use error::{ensure_read_only, ProxyError};
pub use pipeline::{CachedPayload, Pipeline, Resolution, Resolved, UpstreamFailure};
pub use policy::{CachePolicy, ResourceKind, TtlClass};
