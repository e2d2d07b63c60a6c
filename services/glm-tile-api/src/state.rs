//! Process-wide shared state: the event store, tile cache, and poller
//! handles, created once at startup and passed to every handler by `Arc`.

use std::sync::Arc;

use event_store::EventStore;
use glm_s3_poller::{DedupSet, GlmS3Client};
use tile_cache::TileCache;

use crate::Args;

pub struct AppState {
    pub event_store: Arc<EventStore>,
    pub tile_cache: Arc<TileCache>,
    pub s3_client: Arc<GlmS3Client>,
    pub dedup: Arc<DedupSet>,
    pub args: Args,
    pub started_at_ms: i64,
}

impl AppState {
    pub async fn new(args: Args, started_at_ms: i64) -> Self {
        Self {
            event_store: Arc::new(EventStore::default()),
            tile_cache: Arc::new(TileCache::new(args.tile_cache_size)),
            s3_client: Arc::new(GlmS3Client::new().await),
            dedup: Arc::new(DedupSet::new()),
            args,
            started_at_ms,
        }
    }
}
