//! Axum router and handlers for the tile service.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use glm_common::{Event, EventWire, GlmError, Granule, GridVariant, Quality};
use serde::{Deserialize, Serialize};
use tile_cache::CacheKey;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::query::{parse_instant_ms, parse_window_ms};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tiles/:z/:x/:y", get(tiles_handler))
        .route("/ingest", post(ingest_handler))
        .route("/ingest_files", post(ingest_files_handler))
        .route("/ingest_s3", post(ingest_s3_handler))
        .route("/status", get(status_handler))
        .route("/s3/status", get(s3_status_handler))
        .route("/grid/info", get(grid_info_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

/// Wraps [`GlmError`] so it can implement [`IntoResponse`] here without
/// requiring an axum dependency in `glm-common`.
struct ApiError(GlmError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl From<GlmError> for ApiError {
    fn from(e: GlmError) -> Self {
        ApiError(e)
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "events_count": state.event_store.len().await,
        "granules_count": state.dedup.len().await,
        "cache_size": state.tile_cache.len().await,
    }))
}

#[derive(Debug, Deserialize)]
struct TileQuery {
    window: Option<String>,
    t: Option<String>,
    #[serde(default)]
    qc: bool,
    grid_type: Option<String>,
}

async fn tiles_handler(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(u32, u32, String)>,
    Query(params): Query<TileQuery>,
) -> Result<Response, ApiError> {
    let y: u32 = y
        .strip_suffix(".png")
        .unwrap_or(&y)
        .parse()
        .map_err(|_| GlmError::InvalidParameter {
            param: "y".into(),
            message: "expected an integer tile row with a .png suffix".into(),
        })?;

    let max_tile_index = 1u32 << z.min(31);
    if x >= max_tile_index || y >= max_tile_index {
        return Err(GlmError::InvalidParameter {
            param: "x/y".into(),
            message: format!("tile ({x}, {y}) out of range for zoom {z}"),
        }
        .into());
    }

    let window_ms = match &params.window {
        Some(raw) => parse_window_ms(raw).ok_or_else(|| GlmError::InvalidParameter {
            param: "window".into(),
            message: format!("could not parse duration '{raw}'"),
        })?,
        None => toe_aggregator::DEFAULT_WINDOW_MS,
    };

    let end_time_ms = match &params.t {
        Some(raw) => Some(parse_instant_ms(raw).ok_or_else(|| GlmError::InvalidParameter {
            param: "t".into(),
            message: format!("could not parse instant '{raw}'"),
        })?),
        None => None,
    };

    let grid_variant = match params.grid_type.as_deref().unwrap_or("auto") {
        "abi" => GridVariant::Abi,
        "geodetic" => GridVariant::Geodetic,
        "auto" | "" => {
            if state.args.use_abi_grid {
                GridVariant::Abi
            } else {
                GridVariant::Geodetic
            }
        }
        other => {
            return Err(GlmError::InvalidParameter {
                param: "grid_type".into(),
                message: format!("unknown grid_type '{other}', expected auto|abi|geodetic"),
            }
            .into())
        }
    };

    let cache_key = CacheKey::new(z, x, y, window_ms, end_time_ms, params.qc, grid_variant.as_str());

    if let Some(cached) = state.tile_cache.get(&cache_key).await {
        return Ok(tile_response(cached.to_vec(), "HIT", end_time_ms));
    }

    state.event_store.raise_retention_floor(window_ms);
    let now_ms = chrono::Utc::now().timestamp_millis();
    let (start_ms, end_ms) = toe_aggregator::window_bounds(window_ms, end_time_ms, now_ms);
    let events = state.event_store.window(start_ms, end_ms).await;

    let grid = toe_aggregator::aggregate(&events, params.qc, grid_variant, state.args.abi_lon0);
    let png = tile_renderer::render_tile(&grid, z, x, y);

    if CacheKey::is_cacheable_downstream(end_time_ms) {
        state.tile_cache.put(cache_key, std::sync::Arc::from(png.clone())).await;
    }

    Ok(tile_response(png, "MISS", end_time_ms))
}

fn tile_response(body: Vec<u8>, cache_status: &'static str, end_time_ms: Option<i64>) -> Response {
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header("X-Cache", cache_status);
    if end_time_ms.is_some() {
        response = response.header(header::CACHE_CONTROL, "public, max-age=300");
    }
    response.body(body.into()).expect("valid tile response")
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    received: usize,
    accepted: usize,
}

async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    Json(wire_events): Json<Vec<EventWire>>,
) -> impl IntoResponse {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let received = wire_events.len();

    let events: Vec<Event> = wire_events
        .into_iter()
        .filter_map(|w| {
            let energy = w.energy()?;
            Some(Event::new(
                w.lat,
                w.lon,
                energy,
                w.timestamp.unwrap_or(now_ms),
                Quality::from_flag(w.quality_flag),
            ))
        })
        .collect();

    let accepted = state.event_store.ingest(events, now_ms).await;
    Json(IngestResponse { received, accepted })
}

#[derive(Debug, Deserialize)]
struct IngestFilesRequest {
    paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PathOutcome {
    path: String,
    ok: bool,
    events_ingested: usize,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct IngestFilesResponse {
    results: Vec<PathOutcome>,
    total_events_ingested: usize,
}

async fn ingest_files_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestFilesRequest>,
) -> impl IntoResponse {
    let mut results = Vec::with_capacity(req.paths.len());
    let mut total = 0usize;

    for path in req.paths {
        let outcome = ingest_one_path(&state, &path).await;
        total += outcome.events_ingested;
        results.push(outcome);
    }

    Json(IngestFilesResponse {
        results,
        total_events_ingested: total,
    })
}

async fn ingest_one_path(state: &AppState, path: &str) -> PathOutcome {
    let bytes = if let Some(rest) = path.strip_prefix("s3://") {
        let Some((bucket, key)) = rest.split_once('/') else {
            return PathOutcome {
                path: path.to_string(),
                ok: false,
                events_ingested: 0,
                error: Some("malformed s3:// URI, expected s3://bucket/key".into()),
            };
        };
        match state.s3_client.fetch(bucket, key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path, error = %e, "failed to fetch granule for /ingest_files");
                return PathOutcome {
                    path: path.to_string(),
                    ok: false,
                    events_ingested: 0,
                    error: Some(e.to_string()),
                };
            }
        }
    } else {
        match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return PathOutcome {
                    path: path.to_string(),
                    ok: false,
                    events_ingested: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    };

    let granule: Granule = match netcdf_parser::read_granule_from_bytes(&bytes, path) {
        Ok(g) => g,
        Err(e) => {
            warn!(path, error = %e, "failed to parse granule for /ingest_files");
            return PathOutcome {
                path: path.to_string(),
                ok: false,
                events_ingested: 0,
                error: Some(e.to_string()),
            };
        }
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    let accepted = state.event_store.ingest(granule.events, now_ms).await;
    PathOutcome {
        path: path.to_string(),
        ok: true,
        events_ingested: accepted,
        error: None,
    }
}

#[derive(Debug, Deserialize)]
struct IngestS3Request {
    bucket_name: Option<String>,
    hours_back: Option<i64>,
    max_granules: Option<usize>,
}

async fn ingest_s3_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestS3Request>,
) -> impl IntoResponse {
    let config = glm_s3_poller::PollerConfig::new(
        req.bucket_name.unwrap_or_else(|| state.args.poll_bucket.clone()),
        state.args.poll_prefix.clone(),
        state.args.poll_interval_sec,
        req.hours_back.unwrap_or(glm_s3_poller::DEFAULT_HOURS_BACK),
        req.max_granules.unwrap_or(state.args.poll_granules_max),
    );

    let outcome = glm_s3_poller::poll_once(&state.s3_client, &state.dedup, &state.event_store, &config).await;
    info!(
        listed = outcome.listed,
        new = outcome.new,
        ingested = outcome.ingested_events,
        failed = outcome.failed_granules,
        "one-shot /ingest_s3 poll complete"
    );

    Json(serde_json::json!({
        "listed": outcome.listed,
        "new_granules": outcome.new,
        "events_ingested": outcome.ingested_events,
        "failed_granules": outcome.failed_granules,
    }))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.event_store.stats();
    let cache_stats = state.tile_cache.stats();
    Json(serde_json::json!({
        "events_count": state.event_store.len().await,
        "events_ingested_total": stats.ingested.load(std::sync::atomic::Ordering::Relaxed),
        "events_pruned_total": stats.pruned.load(std::sync::atomic::Ordering::Relaxed),
        "events_rejected_total": stats.rejected_invalid.load(std::sync::atomic::Ordering::Relaxed),
        "cache_size": state.tile_cache.len().await,
        "cache_capacity": state.tile_cache.capacity(),
        "cache_hit_rate_pct": cache_stats.hit_rate(),
        "started_at_ms": state.started_at_ms,
    }))
}

async fn s3_status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "poll_enabled": state.args.poll_enabled,
        "poll_bucket": state.args.poll_bucket,
        "poll_prefix": state.args.poll_prefix,
        "poll_interval_sec": state.args.poll_interval_sec,
        "poll_granules_max": state.args.poll_granules_max,
        "granules_seen": state.dedup.len().await,
    }))
}

async fn grid_info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "use_abi_grid": state.args.use_abi_grid,
        "abi_lon0": state.args.abi_lon0,
        "abi_cell_size_m": toe_aggregator::ABI_CELL_SIZE_M,
        "geodetic_cell_size_deg": toe_aggregator::GEODETIC_CELL_SIZE_DEG,
    }))
}
