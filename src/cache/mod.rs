//! Cache & Rate Limiter — C2 (§4.2). Two cache layers per upstream
//! (permanent identifier map, TTL stat-payload store) plus the
//! rate-limiting and circuit-breaking primitives that protect upstreams.
//! Generalized from the teacher's `middleware/rate_limit.rs`
//! (`parking_lot::Mutex<HashMap<..>>`) and
//! `signals/enrichment.rs::get_cached_value` (TTL-keyed reads).

pub mod circuit_breaker;
pub mod rate_limiter;

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub use circuit_breaker::{CircuitBreaker, CircuitStatus};
pub use rate_limiter::TokenBucket;

/// Identifies one cached value: which upstream it came from, which entity
/// it describes, and the shape of the query that produced it (§6
/// "Persisted state layout").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub upstream: String,
    pub entity_id: String,
    pub query_shape: String,
}

impl CacheKey {
    pub fn new(upstream: impl Into<String>, entity_id: impl Into<String>, query_shape: impl Into<String>) -> Self {
        Self { upstream: upstream.into(), entity_id: entity_id.into(), query_shape: query_shape.into() }
    }
}

struct TtlEntry<V> {
    value: V,
    fetched_at: Instant,
}

/// A TTL-keyed cache for stat payloads, guarded by one mutex per store so
/// concurrent writers never produce a torn read (§4.2: "the later write by
/// acquisition order wins; readers always see a consistent prior entry").
pub struct TtlCache<K: Eq + Hash, V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<K, TtlEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns a fresh cached value, or `None` on a miss (absent or
    /// stale). Staleness is `now - fetched_at > ttl`.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.fetched_at.elapsed() <= self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Writes a value. Concurrent writers race under the same mutex, so
    /// whichever acquires the lock last simply overwrites — there's no
    /// window where a reader observes a half-written entry.
    pub fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        entries.insert(key, TtlEntry { value, fetched_at: Instant::now() });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An insertion-order-irrelevant identifier map with at-most-one-writer
/// per key (§6): once a key maps to an id, later writes for the same key
/// are no-ops rather than races, matching the "permanent" lifetime of the
/// mapping (e.g. a normalized player name to a stable player id).
pub struct PermanentCache<K: Eq + Hash, V: Clone> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> PermanentCache<K, V> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    /// Inserts only if absent; returns the value now on file (either the
    /// one just inserted, or the one a prior writer already set).
    pub fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> V) -> V {
        let mut entries = self.entries.lock();
        entries.entry(key).or_insert_with(make).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<K: Eq + Hash, V: Clone> Default for PermanentCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_cache_misses_after_expiry() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_millis(10));
        cache.put("k".to_string(), 42);
        assert_eq!(cache.get(&"k".to_string()), Some(42));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[test]
    fn permanent_cache_first_writer_wins() {
        let cache: PermanentCache<String, i32> = PermanentCache::new();
        let first = cache.get_or_insert_with("k".to_string(), || 1);
        let second = cache.get_or_insert_with("k".to_string(), || 2);
        assert_eq!(first, 1);
        assert_eq!(second, 1);
    }
}
