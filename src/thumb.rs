use crate::cache::ImageCache;
use crate::codec::{self, ThumbRequest};
use crate::config::{ThumbGateConfig, DEFAULT_QUALITY};
use crate::fetch::fetch_image;
use crate::transform::{crop_thumbnail, encode_jpeg, flatten_image};
use crate::{ThumbGateError, METRICS};
use std::sync::atomic::Ordering;
use tokio::fs;

/// Bytes ready to go back to the client.
pub struct ThumbResponse {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Runs one inbound request filename through the full pipeline.
///
/// Sized names fetch the source (cache first), flatten it to a single opaque
/// frame, crop-and-scale to the requested box, and re-encode as JPEG. Names
/// without a size are pass-through: the source bytes are served unmodified
/// under their sniffed content-type.
///
/// Either way the result is also written under the public directory so a
/// static file layer can answer repeat requests; those writes are best effort
/// and never fail the response.
///
/// Every error here maps to a not-found response upstream.
pub async fn handle_thumb(
    name: &str,
    cfg: &ThumbGateConfig,
    cache: &dyn ImageCache,
) -> Result<ThumbResponse, ThumbGateError> {
    match codec::parse_request_name(name)? {
        ThumbRequest::Sized {
            locator,
            width,
            height,
        } => {
            let url = codec::decode_locator(&locator)?;
            let image = fetch_image(&url, cfg, cache).await?;

            let flat = flatten_image(&image.data)?;
            let thumb = crop_thumbnail(flat, width, height);
            let body = encode_jpeg(&thumb, DEFAULT_QUALITY)?;
            METRICS.transforms.fetch_add(1, Ordering::Relaxed);

            let out_name = codec::compose_thumbnail_name(&url, width, height);
            write_output_file(cfg, &out_name, &body).await;

            Ok(ThumbResponse {
                content_type: "image/jpeg",
                body,
            })
        }
        ThumbRequest::PassThrough { locator } => {
            let url = codec::decode_locator(&locator)?;
            let image = fetch_image(&url, cfg, cache).await?;

            // Side cache for future pass-through requests, stored under the
            // sniffed type's real extension.
            let out_name = format!(
                "{}.{}",
                codec::encode_locator(&url),
                image.image_type.extension()
            );
            write_output_file(cfg, &out_name, &image.data).await;

            Ok(ThumbResponse {
                content_type: image.image_type.content_type(),
                body: image.data,
            })
        }
    }
}

// Best effort: the response is served from memory whether or not this lands.
async fn write_output_file(cfg: &ThumbGateConfig, name: &str, bytes: &[u8]) {
    if let Err(e) = store_output(cfg, name, bytes).await {
        METRICS.cache_write_failures.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("failed to write output file {}: {}", name, e);
    }
}

async fn store_output(
    cfg: &ThumbGateConfig,
    name: &str,
    bytes: &[u8],
) -> Result<(), ThumbGateError> {
    if !cfg.public_dir.exists() {
        fs::create_dir_all(&cfg.public_dir)
            .await
            .map_err(|e| ThumbGateError::CacheWriteFailed(e.to_string()))?;
    }
    fs::write(cfg.public_dir.join(name), bytes)
        .await
        .map_err(|e| ThumbGateError::CacheWriteFailed(e.to_string()))
}
