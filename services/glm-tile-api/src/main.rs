//! GLM lightning TOE tile HTTP service.
//!
//! Owns the process-wide event store and tile cache, serves tile/ingest/
//! diagnostic endpoints, and spawns the S3 bucket poller as a background
//! task alongside its own request handling.

mod query;
mod server;
mod state;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use glm_s3_poller::DEFAULT_HOURS_BACK;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use state::AppState;

#[derive(Parser, Debug, Clone)]
#[command(name = "glm-tile-api")]
#[command(about = "GOES-R GLM lightning TOE tile HTTP service")]
pub struct Args {
    /// HTTP listen port.
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Bin events onto the ABI fixed grid instead of a plain geodetic grid
    /// when a request's `grid_type` is `auto`.
    #[arg(long, env = "GLM_USE_ABI_GRID", default_value = "false")]
    pub use_abi_grid: bool,

    /// Sub-satellite longitude for the ABI grid, degrees. -75.0 is GOES-East.
    #[arg(long, env = "GLM_ABI_LON0", default_value = "-75.0")]
    pub abi_lon0: f64,

    /// Maximum number of encoded tiles kept in the LRU cache.
    #[arg(long, env = "GLM_TILE_CACHE_SIZE", default_value = "128")]
    pub tile_cache_size: usize,

    /// Run the background bucket poller.
    #[arg(long, env = "GLM_POLL_ENABLED", default_value = "false")]
    pub poll_enabled: bool,

    /// Public GOES bucket to poll, e.g. `noaa-goes16`.
    #[arg(long, env = "GLM_POLL_BUCKET", default_value = "noaa-goes16")]
    pub poll_bucket: String,

    /// Object-key product prefix to poll under.
    #[arg(long, env = "GLM_POLL_PREFIX", default_value = "GLM-L2-LCFA")]
    pub poll_prefix: String,

    /// Poll interval, seconds (minimum 10, enforced by the poller).
    #[arg(long, env = "GLM_POLL_INTERVAL_SEC", default_value = "60")]
    pub poll_interval_sec: u64,

    /// Max granules considered per poll tick.
    #[arg(long, env = "GLM_POLL_GRANULES_MAX", default_value = "50")]
    pub poll_granules_max: usize,

    /// Log level.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting GLM lightning TOE tile service");

    let started_at_ms = chrono::Utc::now().timestamp_millis();
    let state = Arc::new(AppState::new(args.clone(), started_at_ms).await);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    if args.poll_enabled {
        let poller_config = glm_s3_poller::PollerConfig::new(
            args.poll_bucket.clone(),
            args.poll_prefix.clone(),
            args.poll_interval_sec,
            DEFAULT_HOURS_BACK,
            args.poll_granules_max,
        );
        let client = state.s3_client.clone();
        let dedup = state.dedup.clone();
        let event_store = state.event_store.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            glm_s3_poller::run_forever(client, dedup, event_store, poller_config, shutdown_rx).await;
        });
    } else {
        info!("Bucket poller disabled (GLM_POLL_ENABLED=false)");
    }

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    let app = server::router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.args.port));
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
