//! Upstream access subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline cache miss
//!     → scheduler.rs (FIFO queue, at most C in flight, D ms spacing per slot)
//!     → fetcher.rs (attempt budget, retry classification, backoff, header variation)
//!     → client.rs (one outbound GET through the Upstream trait)
//!     ← raw outcome (status + body, or transport error) back to the pipeline
//! ```
//!
//! # Design Decisions
//! - The scheduler is the only concurrency control; the fetcher has none
//! - Neither layer decides the inbound HTTP status; they return raw outcomes
//! - `Upstream` is a trait so tests can run the whole pipeline without sockets

pub mod client;
pub mod fetcher;
pub mod scheduler;

pub use client::{HttpUpstream, ResponseMeta, TransportError, Upstream, UpstreamResponse};
pub use fetcher::{FetchAttempt, Fetcher};
pub use scheduler::{Scheduler, SchedulerError};
