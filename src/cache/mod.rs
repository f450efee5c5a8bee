// Re-export modules
pub mod disk;

pub use disk::DiskCache;

use crate::config::ImageType;
use std::time::SystemTime;

/// A source image as stored in the long-term cache.
///
/// `data` is the payload exactly as downloaded; `image_type` is always the
/// sniffed type of those bytes — entries that fail classification are never
/// constructed.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub image_type: ImageType,
    pub timestamp: SystemTime,
    pub data: Vec<u8>,
}

/// Trait for source image cache backends
#[async_trait::async_trait]
pub trait ImageCache: Send + Sync {
    /// Derive the cache key for a source URL
    fn key_for(&self, url: &str) -> String;

    /// Get a cached image by key; a missing entry is `Ok(None)`, not an error
    async fn get(&self, key: &str) -> Result<Option<CachedImage>, String>;

    /// Store an image under a key; entries are immutable once written
    async fn put(&self, key: &str, image: &CachedImage) -> Result<(), String>;
}
