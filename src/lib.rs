use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use thiserror::Error;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::services::ServeDir;

pub mod cache;
pub mod codec;
pub mod config;
pub mod fetch;
pub mod resolve;
pub mod sniff;
pub mod thumb;
pub mod transform;

use crate::cache::DiskCache;
use crate::config::{ThumbGateConfig, CACHE_EXT, DEFAULT_CACHE_CONTROL};
use crate::thumb::handle_thumb;

#[derive(Error, Debug)]
pub enum ThumbGateError {
    #[error("Malformed request name: {0}")]
    MalformedRequestName(String),
    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),
    #[error("Unrecognized image format")]
    UnrecognizedFormat,
    #[error("Cache write failed: {0}")]
    CacheWriteFailed(String),
    #[error("Transform failed: {0}")]
    TransformFailed(String),
}

pub type Result<T> = std::result::Result<T, ThumbGateError>;

async fn thumb_handler(
    Path(file): Path<String>,
    State(state): State<Arc<ThumbGateConfig>>,
) -> impl IntoResponse {
    tracing::debug!("thumbnail request: file={}", file);

    let cache = DiskCache::new(state.cache_dir.clone());
    match handle_thumb(&file, &state, &cache).await {
        Ok(resp) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                axum::http::header::CONTENT_TYPE,
                HeaderValue::from_static(resp.content_type),
            );
            headers.insert("Cache-Control", HeaderValue::from_static(DEFAULT_CACHE_CONTROL));
            (headers, Body::from(resp.body)).into_response()
        }
        Err(e) => {
            METRICS.not_found.fetch_add(1, Ordering::Relaxed);
            match e {
                ThumbGateError::MalformedRequestName(_) => {
                    tracing::debug!("rejecting malformed request name {}: {}", file, e)
                }
                _ => tracing::error!("thumbnail request {} failed: {}", file, e),
            }
            // Empty body either way; the client only learns "no image here"
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

// ====================================================================================
// OBSERVABILITY
// ====================================================================================

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics tracking
pub struct Metrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub downloads: AtomicU64,
    pub download_errors: AtomicU64,
    pub transforms: AtomicU64,
    pub cache_write_failures: AtomicU64,
    pub not_found: AtomicU64,
    /// Accumulated wall-clock of whole fetches, cache lookups included.
    pub fetch_millis: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            downloads: AtomicU64::new(0),
            download_errors: AtomicU64::new(0),
            transforms: AtomicU64::new(0),
            cache_write_failures: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            fetch_millis: AtomicU64::new(0),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    pub static ref METRICS: Metrics = Metrics::new();
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    use serde_json::json;

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "thumbgate"
    }))
}

/// Cache statistics endpoint
async fn cache_stats_handler(
    State(state): State<Arc<ThumbGateConfig>>,
) -> impl IntoResponse {
    use serde_json::json;

    let mut entry_count = 0u64;
    let mut total_size_bytes = 0u64;
    if let Ok(mut dir) = tokio::fs::read_dir(&state.cache_dir).await {
        while let Ok(Some(entry)) = dir.next_entry().await {
            if entry.path().extension().and_then(|e| e.to_str()) == Some(CACHE_EXT) {
                if let Ok(meta) = entry.metadata().await {
                    entry_count += 1;
                    total_size_bytes += meta.len();
                }
            }
        }
    }

    let hits = METRICS.cache_hits.load(Ordering::Relaxed);
    let misses = METRICS.cache_misses.load(Ordering::Relaxed);
    let total_requests = hits + misses;
    let hit_rate = if total_requests > 0 {
        (hits as f64 / total_requests as f64) * 100.0
    } else {
        0.0
    };

    Json(json!({
        "cache": {
            "entry_count": entry_count,
            "total_size_bytes": total_size_bytes,
            "total_size_mb": total_size_bytes as f64 / 1024.0 / 1024.0,
        },
        "requests": {
            "cache_hits": hits,
            "cache_misses": misses,
            "total": total_requests,
            "hit_rate_percent": hit_rate,
        },
        "downloads": {
            "total": METRICS.downloads.load(Ordering::Relaxed),
            "errors": METRICS.download_errors.load(Ordering::Relaxed),
            "fetch_millis_total": METRICS.fetch_millis.load(Ordering::Relaxed),
        },
        "transforms": {
            "total": METRICS.transforms.load(Ordering::Relaxed),
        }
    }))
}

/// Metrics endpoint (Prometheus-compatible plain text)
async fn metrics_handler() -> impl IntoResponse {
    let hits = METRICS.cache_hits.load(Ordering::Relaxed);
    let misses = METRICS.cache_misses.load(Ordering::Relaxed);
    let downloads = METRICS.downloads.load(Ordering::Relaxed);
    let download_errors = METRICS.download_errors.load(Ordering::Relaxed);
    let transforms = METRICS.transforms.load(Ordering::Relaxed);
    let fetch_millis = METRICS.fetch_millis.load(Ordering::Relaxed);

    let metrics = format!(
        "# HELP thumbgate_cache_hits_total Total number of cache hits\n\
         # TYPE thumbgate_cache_hits_total counter\n\
         thumbgate_cache_hits_total {}\n\
         # HELP thumbgate_cache_misses_total Total number of cache misses\n\
         # TYPE thumbgate_cache_misses_total counter\n\
         thumbgate_cache_misses_total {}\n\
         # HELP thumbgate_downloads_total Total number of source fetches\n\
         # TYPE thumbgate_downloads_total counter\n\
         thumbgate_downloads_total {}\n\
         # HELP thumbgate_download_errors_total Total number of failed source fetches\n\
         # TYPE thumbgate_download_errors_total counter\n\
         thumbgate_download_errors_total {}\n\
         # HELP thumbgate_transforms_total Total number of thumbnail transforms\n\
         # TYPE thumbgate_transforms_total counter\n\
         thumbgate_transforms_total {}\n\
         # HELP thumbgate_fetch_milliseconds_total Accumulated fetch wall-clock in milliseconds\n\
         # TYPE thumbgate_fetch_milliseconds_total counter\n\
         thumbgate_fetch_milliseconds_total {}\n",
        hits, misses, downloads, download_errors, transforms, fetch_millis
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics,
    )
}

pub fn router(config: ThumbGateConfig) -> Router {
    let state = Arc::new(config);

    // Observability endpoints - NO rate limiting
    let observability_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/stats/cache", get(cache_stats_handler).with_state(state.clone()))
        .route("/metrics", get(metrics_handler));

    // Thumbnail endpoint - WITH rate limiting
    let mut thumb_routes =
        Router::new().route("/thumb/:file", get(thumb_handler).with_state(state.clone()));

    // Only add rate limiting if not disabled
    if std::env::var("DISABLE_RATE_LIMIT").is_err() {
        // 10 req/sec per IP, burst of 30
        let governor_conf = Box::new(
            GovernorConfigBuilder::default()
                .per_second(10)
                .burst_size(30)
                .finish()
                .unwrap(),
        );

        tracing::info!("Router configured with rate limiting: 10/sec, burst 30");

        thumb_routes = thumb_routes.layer(GovernorLayer {
            config: Box::leak(governor_conf),
        });
    } else {
        tracing::info!("Rate limiting disabled");
    }

    // Previously written thumbnails are served as static files without
    // re-entering the pipeline
    Router::new()
        .merge(observability_routes)
        .merge(thumb_routes)
        .fallback_service(ServeDir::new(&state.public_dir))
}
