use crate::cache::{CachedImage, ImageCache};
use crate::config::{ImageType, CACHE_EXT, TYPE_TAG_LEN};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;

/// One file per key under the cache root: a fixed-width type tag followed by
/// the raw payload. Entries persist until removed out-of-band; there is no
/// eviction here.
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, CACHE_EXT))
    }
}

#[async_trait::async_trait]
impl ImageCache for DiskCache {
    fn key_for(&self, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn get(&self, key: &str) -> Result<Option<CachedImage>, String> {
        let p = self.path_for(key);
        let meta = match fs::metadata(&p).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.to_string()),
        };

        let raw = fs::read(&p).await.map_err(|e| e.to_string())?;
        if raw.len() < TYPE_TAG_LEN {
            return Ok(None);
        }
        let image_type = match ImageType::from_tag(&raw[..TYPE_TAG_LEN]) {
            Some(t) => t,
            // An unknown tag reads as a miss; the entry gets rewritten on the
            // next successful fetch.
            None => return Ok(None),
        };
        let timestamp = meta.modified().map_err(|e| e.to_string())?;

        Ok(Some(CachedImage {
            image_type,
            timestamp,
            data: raw[TYPE_TAG_LEN..].to_vec(),
        }))
    }

    async fn put(&self, key: &str, image: &CachedImage) -> Result<(), String> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).await.map_err(|e| e.to_string())?;
        }

        // Full write to a temp name, then rename: a concurrent reader never
        // observes a partially written entry. Same-key write races are
        // harmless since both writers carry identical bytes.
        let mut buf = Vec::with_capacity(TYPE_TAG_LEN + image.data.len());
        buf.extend_from_slice(image.image_type.tag());
        buf.extend_from_slice(&image.data);

        let tmp = self.dir.join(format!("{}.{}.tmp", key, CACHE_EXT));
        fs::write(&tmp, &buf).await.map_err(|e| e.to_string())?;
        fs::rename(&tmp, self.path_for(key))
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
