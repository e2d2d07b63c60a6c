//! In-memory, append-friendly store of GLM lightning events.
//!
//! A single `RwLock`-guarded buffer behind a small handle type, with an
//! atomic stats struct for cheap diagnostics reads. Unlike a keyed cache
//! this has no TTL-on-read or eviction-on-insert concept — it prunes in
//! bulk on a schedule instead of lazily per access, since entries don't
//! individually expire.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use glm_common::Event;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Default retention window: events older than this are pruned.
pub const DEFAULT_RETENTION_MS: i64 = 24 * 60 * 60 * 1000;

/// Diagnostics counters, safe to read without taking the store's lock.
#[derive(Default)]
pub struct EventStoreStats {
    pub ingested: AtomicU64,
    pub pruned: AtomicU64,
    pub clamped_future: AtomicU64,
    pub rejected_invalid: AtomicU64,
}

/// Process-wide in-memory buffer of GLM events.
///
/// Appends, reads (for aggregation), and pruning all serialize through one
/// `tokio::sync::RwLock`; reads take a read guard so concurrent tile
/// requests don't block each other, only appends and prunes contend.
pub struct EventStore {
    events: RwLock<Vec<Event>>,
    retention_ms: AtomicI64,
    stats: Arc<EventStoreStats>,
}

impl EventStore {
    /// Build a store with the given retention floor. The *effective*
    /// retention used by `prune` is `max(retention_ms, largest_window_ms)`,
    /// set via [`EventStore::raise_retention_floor`] whenever the
    /// aggregator is asked for a wider window than it has seen before.
    pub fn new(retention_ms: i64) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            retention_ms: AtomicI64::new(retention_ms),
            stats: Arc::new(EventStoreStats::default()),
        }
    }

    pub fn stats(&self) -> &EventStoreStats {
        &self.stats
    }

    /// Raise the retention floor if `window_ms` needs a longer lookback
    /// than currently guaranteed. Never lowers it.
    pub fn raise_retention_floor(&self, window_ms: i64) {
        let current = self.retention_ms.load(Ordering::Relaxed);
        if window_ms > current {
            self.retention_ms.store(window_ms, Ordering::Relaxed);
        }
    }

    /// Append a batch of already-validated events, clamping any
    /// future timestamp to `now_ms` first. Invalid events (see
    /// [`glm_common::Event::is_valid`]) are rejected and counted, never
    /// stored.
    #[instrument(skip(self, events))]
    pub async fn ingest(&self, events: Vec<Event>, now_ms: i64) -> usize {
        let mut accepted = Vec::with_capacity(events.len());
        for mut event in events {
            if !event.is_valid() {
                self.stats.rejected_invalid.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if event.timestamp_ms > now_ms {
                event.timestamp_ms = now_ms;
                self.stats.clamped_future.fetch_add(1, Ordering::Relaxed);
            }
            accepted.push(event);
        }

        let count = accepted.len();
        if count > 0 {
            let mut guard = self.events.write().await;
            guard.extend(accepted);
            self.stats.ingested.fetch_add(count as u64, Ordering::Relaxed);
        }
        self.prune(now_ms).await;
        count
    }

    /// Discard events older than `now_ms - retention_ms`.
    pub async fn prune(&self, now_ms: i64) {
        let retention_ms = self.retention_ms.load(Ordering::Relaxed);
        let cutoff = now_ms - retention_ms;
        let mut guard = self.events.write().await;
        let before = guard.len();
        guard.retain(|e| e.timestamp_ms >= cutoff);
        let removed = before - guard.len();
        if removed > 0 {
            self.stats.pruned.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, remaining = guard.len(), "pruned event store");
        }
    }

    /// Snapshot all events with `start_ms <= timestamp_ms <= end_ms`.
    ///
    /// Clones the matching events rather than holding the read lock across
    /// the caller's aggregation work, keeping the critical section short.
    pub async fn window(&self, start_ms: i64, end_ms: i64) -> Vec<Event> {
        let guard = self.events.read().await;
        guard
            .iter()
            .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms <= end_ms)
            .copied()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glm_common::{FemtoJoules, Quality};

    fn event(ts: i64) -> Event {
        Event::new(10.0, 20.0, FemtoJoules(1.0), ts, Quality::Unknown)
    }

    #[tokio::test]
    async fn ingest_clamps_future_timestamps() {
        let store = EventStore::new(DEFAULT_RETENTION_MS);
        let now = 10_000;
        store.ingest(vec![event(now + 5_000)], now).await;
        let window = store.window(0, now).await;
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].timestamp_ms, now);
        assert_eq!(store.stats().clamped_future.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn ingest_rejects_invalid_events() {
        let store = EventStore::new(DEFAULT_RETENTION_MS);
        let bad = Event::new(200.0, 20.0, FemtoJoules(1.0), 0, Quality::Unknown);
        let accepted = store.ingest(vec![bad], 0).await;
        assert_eq!(accepted, 0);
        assert_eq!(store.stats().rejected_invalid.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn prune_discards_events_older_than_retention() {
        let store = EventStore::new(1_000);
        store.ingest(vec![event(0), event(5_000)], 5_000).await;
        // prune() already ran inside ingest(); events at t=0 with a 1s
        // retention and now=5000 should be gone.
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn raise_retention_floor_never_lowers() {
        let store = EventStore::new(1_000);
        store.raise_retention_floor(60_000);
        store.raise_retention_floor(10_000);
        store.ingest(vec![event(0)], 30_000).await;
        assert_eq!(store.len().await, 1, "60s floor should have been kept");
    }

    #[tokio::test]
    async fn window_filters_by_inclusive_bounds() {
        let store = EventStore::new(DEFAULT_RETENTION_MS);
        store.ingest(vec![event(100), event(200), event(300)], 300).await;
        let window = store.window(100, 200).await;
        assert_eq!(window.len(), 2);
    }
}
