//! Background bucket-polling loop.
//!
//! A `tokio::select!` between a sleep and a broadcast shutdown receiver,
//! with per-tick errors logged and swallowed rather than propagated.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use event_store::EventStore;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::client::GlmS3Client;

pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const MIN_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_HOURS_BACK: i64 = 2;

pub const DEFAULT_PRODUCT_PREFIX: &str = "GLM-L2-LCFA";

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub bucket: String,
    pub product_prefix: String,
    pub interval_secs: u64,
    pub hours_back: i64,
    pub max_granules: usize,
}

impl PollerConfig {
    pub fn new(
        bucket: impl Into<String>,
        product_prefix: impl Into<String>,
        interval_secs: u64,
        hours_back: i64,
        max_granules: usize,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            product_prefix: product_prefix.into(),
            interval_secs: interval_secs.max(MIN_INTERVAL_SECS),
            hours_back,
            max_granules,
        }
    }
}

/// Tracks which object keys have already been ingested this process
/// lifetime, so re-polling an overlapping window doesn't double-count
/// events. Single-writer: only the poller task touches this.
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    async fn filter_new(&self, keys: Vec<String>) -> Vec<String> {
        let mut seen = self.seen.lock().await;
        keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one poll tick, for `/s3/status` diagnostics.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    pub listed: usize,
    pub new: usize,
    pub ingested_events: usize,
    pub failed_granules: usize,
}

/// Run one poll tick: list recent keys, skip already-seen ones, fetch and
/// parse each new granule, and append its events to the store. Per-granule
/// failures are logged and counted, never fatal to the tick.
pub async fn poll_once(
    client: &GlmS3Client,
    dedup: &DedupSet,
    store: &EventStore,
    config: &PollerConfig,
) -> PollOutcome {
    let keys = client
        .latest(
            &config.bucket,
            &config.product_prefix,
            config.max_granules,
            config.hours_back,
        )
        .await;
    let listed = keys.len();
    let new_keys = dedup.filter_new(keys).await;

    let mut outcome = PollOutcome {
        listed,
        new: new_keys.len(),
        ..Default::default()
    };

    for key in new_keys {
        match client.fetch(&config.bucket, &key).await {
            Ok(bytes) => match netcdf_parser::read_granule_from_bytes(&bytes, &key) {
                Ok(granule) => {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let n = store.ingest(granule.events, now_ms).await;
                    outcome.ingested_events += n;
                }
                Err(e) => {
                    warn!(key, error = %e, "failed to parse polled granule");
                    outcome.failed_granules += 1;
                }
            },
            Err(e) => {
                warn!(key, error = %e, "failed to fetch polled granule");
                outcome.failed_granules += 1;
            }
        }
    }

    outcome
}

/// Run the poll loop forever, until `shutdown` fires. Never exits on a
/// transient per-tick failure.
pub async fn run_forever(
    client: Arc<GlmS3Client>,
    dedup: Arc<DedupSet>,
    store: Arc<EventStore>,
    config: PollerConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(bucket = %config.bucket, interval_secs = config.interval_secs, "starting GLM bucket poller");
    loop {
        let outcome = poll_once(&client, &dedup, &store, &config).await;
        info!(
            listed = outcome.listed,
            new = outcome.new,
            ingested_events = outcome.ingested_events,
            failed_granules = outcome.failed_granules,
            "poll tick complete"
        );

        tokio::select! {
            _ = shutdown.recv() => {
                info!("GLM bucket poller shutting down");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(config.interval_secs)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dedup_set_only_admits_each_key_once() {
        let dedup = DedupSet::new();
        let first = dedup.filter_new(vec!["a".into(), "b".into()]).await;
        assert_eq!(first.len(), 2);
        let second = dedup.filter_new(vec!["a".into(), "c".into()]).await;
        assert_eq!(second, vec!["c".to_string()]);
    }

    #[test]
    fn poller_config_enforces_minimum_interval() {
        let config = PollerConfig::new("noaa-goes16", DEFAULT_PRODUCT_PREFIX, 1, 2, 10);
        assert_eq!(config.interval_secs, MIN_INTERVAL_SECS);
    }
}
