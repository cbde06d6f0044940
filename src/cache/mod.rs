//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream 2xx
//!     → pipeline writes CachedPayload via put(key, value, ttl)
//!
//! Inbound request
//!     → get_fresh(key)          (within ttl)
//!     → on upstream failure: get_stale(key, horizon)
//!
//! Background
//!     → purge_expired(horizon)  (bounds memory, not needed for correctness)
//! ```
//!
//! # Design Decisions
//! - Entries are immutable once written; refresh overwrites wholesale
//! - Bounded by entry count with LRU eviction, independent of ttl
//! - Expiry is lazy and checked on read; reads never extend ttl
//! - Reads return absence instead of failing

pub mod ttl;

pub use ttl::TtlCache;
