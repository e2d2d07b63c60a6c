//! Bounded LRU cache of encoded PNG tiles.
//!
//! No TTL-on-read machinery: entries here don't expire on their own,
//! since the composite cache key already encodes every parameter (window,
//! end time, QC, grid variant) that affects pixel content. A stale entry
//! for a given key would only exist if the event store changed underneath
//! an unbounded `end_time=now` key, which [`CacheKey::is_cacheable_downstream`]
//! keeps out of the cache entirely.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

pub const DEFAULT_CAPACITY: usize = 128;

/// Composite key covering every parameter that affects tile pixels:
/// `"{z}/{x}/{y}?w={window_ms}&t={end_ms|0}&qc={0|1}&g={abi|geodetic}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        z: u32,
        x: u32,
        y: u32,
        window_ms: i64,
        end_ms: Option<i64>,
        qc_strict: bool,
        grid: &str,
    ) -> Self {
        CacheKey(format!(
            "{z}/{x}/{y}?w={window_ms}&t={}&qc={}&g={grid}",
            end_ms.unwrap_or(0),
            if qc_strict { 1 } else { 0 },
        ))
    }

    /// An omitted `end_time` ("now") is a moving target: the same key
    /// would mean different pixels from one second to the next, so
    /// downstream HTTP caches must not be told to cache it.
    pub fn is_cacheable_downstream(end_ms: Option<i64>) -> bool {
        end_ms.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Default)]
pub struct TileCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl TileCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

/// Bounded LRU cache storing encoded PNG bytes only, never grids or events.
pub struct TileCache {
    cache: Arc<RwLock<LruCache<CacheKey, Arc<[u8]>>>>,
    capacity: usize,
    stats: Arc<TileCacheStats>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("capacity clamped to at least 1"),
            ))),
            capacity,
            stats: Arc::new(TileCacheStats::default()),
        }
    }

    /// Get an entry, touching it to most-recently-used on hit.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<[u8]>> {
        let mut cache = self.cache.write().await;
        match cache.get(key) {
            Some(data) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(data.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an entry, evicting the least-recently-used one if at capacity.
    pub async fn put(&self, key: CacheKey, data: Arc<[u8]>) {
        let mut cache = self.cache.write().await;
        if cache.len() >= self.capacity && !cache.contains(&key) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        cache.put(key, data);
    }

    pub fn stats(&self) -> &TileCacheStats {
        &self.stats
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u32) -> CacheKey {
        CacheKey::new(4, n, 5, 300_000, None, false, "abi")
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = TileCache::new(10);
        assert!(cache.get(&key(1)).await.is_none());
        cache.put(key(1), Arc::from(vec![1, 2, 3])).await;
        assert_eq!(cache.get(&key(1)).await.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used_at_capacity() {
        let cache = TileCache::new(2);
        cache.put(key(1), Arc::from(vec![1])).await;
        cache.put(key(2), Arc::from(vec![2])).await;
        cache.put(key(3), Arc::from(vec![3])).await;
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&key(1)).await.is_none());
        assert!(cache.get(&key(2)).await.is_some());
        assert!(cache.get(&key(3)).await.is_some());
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn omitted_end_time_is_uncacheable_downstream() {
        assert!(!CacheKey::is_cacheable_downstream(None));
        assert!(CacheKey::is_cacheable_downstream(Some(1)));
    }

    #[test]
    fn key_format_matches_spec_composite_string() {
        let k = CacheKey::new(4, 1, 2, 300_000, Some(999), true, "geodetic");
        assert_eq!(k.as_str(), "4/1/2?w=300000&t=999&qc=1&g=geodetic");
    }
}
