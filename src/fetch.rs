use crate::cache::{CachedImage, ImageCache};
use crate::config::ThumbGateConfig;
use crate::{sniff, ThumbGateError, METRICS};
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::Client;
use std::sync::atomic::Ordering;
use std::time::{Instant, SystemTime};

/// Fetches a source image, cache first.
///
/// Algorithm:
/// 1. Internal CDN URLs are rewritten to plain http (TLS already terminated
///    at the edge)
/// 2. Cache hit returns immediately with no network access
/// 3. On miss, bytes come from the local filesystem for path/`file://`
///    locators, otherwise from an HTTP GET with streamed size enforcement
/// 4. Bytes must pass header sniffing before anything is cached or returned
///
/// Persisting the fresh download is best effort: a failed cache write is
/// logged and counted, and the caller still gets the image.
///
/// Download lifecycle events and the whole-call duration go to the global
/// metrics; they never affect control flow.
///
/// # Errors
/// - `SourceUnreachable`: network/file failure, timeout, empty body, or an
///   over-limit payload
/// - `UnrecognizedFormat`: bytes retrieved but no known magic number
pub async fn fetch_image(
    url: &str,
    cfg: &ThumbGateConfig,
    cache: &dyn ImageCache,
) -> Result<CachedImage, ThumbGateError> {
    let started = Instant::now();
    let url = normalize_internal_url(url, cfg);

    METRICS.downloads.fetch_add(1, Ordering::Relaxed);
    tracing::debug!("download begin: url={}", url);

    let key = cache.key_for(&url);
    match cache.get(&key).await {
        Ok(Some(hit)) => {
            METRICS.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::info!("cache hit for key={}", key);
            record_fetch_time(started);
            return Ok(hit);
        }
        Ok(None) => {
            METRICS.cache_misses.fetch_add(1, Ordering::Relaxed);
            tracing::info!("cache miss for key={}, fetching {}", key, url);
        }
        Err(e) => {
            // An unreadable entry degrades to a refetch
            METRICS.cache_misses.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("cache read failed for key={}: {}", key, e);
        }
    }

    let bytes = match retrieve(&url, cfg).await {
        Ok(b) if !b.is_empty() => b,
        Ok(_) => {
            download_error(&url, "empty response body");
            return Err(ThumbGateError::SourceUnreachable("empty response body".into()));
        }
        Err(e) => {
            download_error(&url, &e.to_string());
            return Err(e);
        }
    };

    let image_type = match sniff::classify(&bytes) {
        Some(t) => t,
        None => {
            download_error(&url, "unrecognized image format");
            return Err(ThumbGateError::UnrecognizedFormat);
        }
    };

    let image = CachedImage {
        image_type,
        timestamp: SystemTime::now(),
        data: bytes,
    };

    if let Err(e) = cache.put(&key, &image).await {
        METRICS.cache_write_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("cache write failed for key={}: {}", key, e);
        // Continue anyway - we can still serve the image
    }

    tracing::debug!("download complete: url={} type={}", url, image.image_type);
    record_fetch_time(started);
    Ok(image)
}

// TLS terminates at the load balancer for internal CDN traffic, so anything
// under the configured base is fetched over plain http.
fn normalize_internal_url(url: &str, cfg: &ThumbGateConfig) -> String {
    if let Some(base) = &cfg.cdn_base_url {
        if url.starts_with(base.as_str()) && url.starts_with("https") {
            return url.replacen("https", "http", 1);
        }
    }
    url.to_string()
}

// Absolute paths and file:// locators read straight from disk.
fn local_source(url: &str) -> Option<&str> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(path);
    }
    if url.starts_with('/') {
        return Some(url);
    }
    None
}

async fn retrieve(url: &str, cfg: &ThumbGateConfig) -> Result<Vec<u8>, ThumbGateError> {
    match local_source(url) {
        Some(path) => tokio::fs::read(path)
            .await
            .map_err(|e| ThumbGateError::SourceUnreachable(e.to_string())),
        None => download_http(url, cfg).await,
    }
}

async fn download_http(url: &str, cfg: &ThumbGateConfig) -> Result<Vec<u8>, ThumbGateError> {
    let client = Client::builder()
        .timeout(cfg.fetch_timeout)
        .build()
        .map_err(|e| ThumbGateError::SourceUnreachable(e.to_string()))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| ThumbGateError::SourceUnreachable(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(ThumbGateError::SourceUnreachable(format!(
            "upstream status: {}",
            resp.status()
        )));
    }

    // Pre-flight size check based on Content-Length header
    if let Some(len) = resp.content_length() {
        if len as usize > cfg.max_input_size {
            return Err(ThumbGateError::SourceUnreachable(
                "input exceeds size limit".into(),
            ));
        }
    }

    // Stream response with size enforcement to prevent header spoofing
    let mut buf = BytesMut::with_capacity(8192);
    let mut stream = resp.bytes_stream();

    while let Some(chunk) = stream
        .next()
        .await
        .transpose()
        .map_err(|e| ThumbGateError::SourceUnreachable(e.to_string()))?
    {
        if buf.len() + chunk.len() > cfg.max_input_size {
            return Err(ThumbGateError::SourceUnreachable(
                "input exceeds size limit".into(),
            ));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.to_vec())
}

fn download_error(url: &str, reason: &str) {
    METRICS.download_errors.fetch_add(1, Ordering::Relaxed);
    tracing::error!("download error for {}: {}", url, reason);
}

fn record_fetch_time(started: Instant) {
    METRICS
        .fetch_millis
        .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
}
