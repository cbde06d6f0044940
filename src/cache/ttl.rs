//! Bounded, time-aware key/value store with fresh and stale reads.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use crate::observability::metrics;

/// A single cached value and the moment it was written.
struct CacheEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }
}

/// LRU-bounded cache whose entries are fresh within their own ttl and
/// usable as fallback within a caller-supplied stale horizon.
///
/// The lock is never held across an `.await`, so a std mutex is enough.
pub struct TtlCache<V> {
    inner: Mutex<LruCache<String, CacheEntry<V>>>,
}

impl<V> TtlCache<V> {
    /// Create a cache holding at most `max_entries` values.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave an entry half-written,
        // so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `value`, replacing any previous entry for `key`, and return the shared copy.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) -> Arc<V> {
        let key = key.into();
        let value = Arc::new(value);
        let entry = CacheEntry {
            value: value.clone(),
            stored_at: Instant::now(),
            ttl,
        };

        let mut inner = self.lock();
        if let Some((evicted, _)) = inner.push(key.clone(), entry) {
            if evicted != key {
                tracing::debug!(key = %evicted, "Cache entry evicted (capacity)");
                metrics::record_cache_eviction();
            }
        }
        metrics::record_cache_size(inner.len());
        value
    }

    /// Value for `key` if it was written no more than its ttl ago.
    pub fn get_fresh(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        let mut inner = self.lock();
        let value = inner
            .get(key)
            .filter(|entry| entry.age(now) <= entry.ttl)
            .map(|entry| entry.value.clone());
        value
    }

    /// Value for `key` if it was written no more than `horizon` ago,
    /// regardless of its ttl. Entries past the horizon are dropped.
    pub fn get_stale(&self, key: &str, horizon: Duration) -> Option<Arc<V>> {
        let now = Instant::now();
        let mut inner = self.lock();
        let (value, expired) = match inner.get(key) {
            Some(entry) if entry.age(now) <= horizon => (Some(entry.value.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };
        if expired {
            inner.pop(key);
            metrics::record_cache_size(inner.len());
        }
        value
    }

    /// Age of the entry for `key`, if one exists.
    pub fn age_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let inner = self.lock();
        let age = inner.peek(key).map(|entry| entry.age(now));
        age
    }

    /// Drop every entry written more than `horizon` ago. Returns how many were removed.
    pub fn purge_expired(&self, horizon: Duration) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .iter()
            .filter(|(_, entry)| entry.age(now) > horizon)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.pop(key);
        }
        metrics::record_cache_size(inner.len());
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HORIZON: Duration = Duration::from_secs(12 * 3600);

    #[tokio::test(start_paused = true)]
    async fn test_absent_keys() {
        let cache: TtlCache<String> = TtlCache::new(4);
        assert!(cache.get_fresh("never").is_none());
        assert!(cache.get_stale("never", HORIZON).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_then_stale_then_gone() {
        let cache = TtlCache::new(4);
        cache.put("k", "v".to_string(), Duration::from_secs(60));

        assert_eq!(cache.get_fresh("k").as_deref(), Some(&"v".to_string()));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get_fresh("k").is_some(), "fresh up to and including ttl");

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get_fresh("k").is_none());
        assert_eq!(cache.get_stale("k", HORIZON).as_deref(), Some(&"v".to_string()));

        tokio::time::advance(HORIZON).await;
        assert!(cache.get_stale("k", HORIZON).is_none());
        assert!(cache.is_empty(), "entry past the horizon is dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_extend_ttl() {
        let cache = TtlCache::new(4);
        cache.put("k", 1u32, Duration::from_secs(10));

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(3)).await;
            let _ = cache.get_fresh("k");
        }
        assert!(cache.get_fresh("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_timestamp() {
        let cache = TtlCache::new(4);
        cache.put("k", 1u32, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put("k", 2u32, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get_fresh("k").as_deref(), Some(&2));
        assert_eq!(cache.age_of("k"), Some(Duration::from_secs(8)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lru_eviction_ignores_ttl() {
        let cache = TtlCache::new(2);
        cache.put("a", 1u32, Duration::from_secs(3600));
        cache.put("b", 2u32, Duration::from_secs(1));

        // Touch "a" so "b" becomes least recently used.
        assert!(cache.get_fresh("a").is_some());
        cache.put("c", 3u32, Duration::from_secs(3600));

        assert_eq!(cache.len(), 2);
        assert!(cache.get_stale("b", HORIZON).is_none());
        assert!(cache.get_fresh("a").is_some());
        assert!(cache.get_fresh("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = TtlCache::new(8);
        cache.put("old", 1u32, Duration::from_secs(10));
        tokio::time::advance(Duration::from_secs(100)).await;
        cache.put("new", 2u32, Duration::from_secs(10));

        assert_eq!(cache.purge_expired(Duration::from_secs(50)), 1);
        assert!(cache.get_stale("old", HORIZON).is_none());
        assert!(cache.get_stale("new", HORIZON).is_some());
    }
}
