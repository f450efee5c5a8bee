use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// File extension for long-term source cache entries.
pub const CACHE_EXT: &str = "csh";

/// Fixed width of the type tag at the head of every cache file.
pub const TYPE_TAG_LEN: usize = 3;

/// Path prefix thumbnail requests arrive under. Encoded locators that carry
/// it are stripped before decoding.
pub const THUMB_PATH: &str = "/thumb/";

pub const DEFAULT_MAX_INPUT: usize = 16 * 1024 * 1024;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_QUALITY: u8 = 90;
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Image formats the proxy recognizes and serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
}

impl ImageType {
    /// The fixed-width tag written at the head of a cache file.
    pub fn tag(self) -> &'static [u8; TYPE_TAG_LEN] {
        match self {
            ImageType::Jpeg => b"jpg",
            ImageType::Png => b"png",
            ImageType::Gif => b"gif",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"jpg" => Some(ImageType::Jpeg),
            b"png" => Some(ImageType::Png),
            b"gif" => Some(ImageType::Gif),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
        }
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageType::Jpeg => write!(f, "jpeg"),
            ImageType::Png => write!(f, "png"),
            ImageType::Gif => write!(f, "gif"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThumbGateConfig {
    /// Root directory of the long-term source image cache.
    pub cache_dir: PathBuf,
    /// Directory transformed output files are published under; a static file
    /// layer serves repeat requests from here without re-entering the pipeline.
    pub public_dir: PathBuf,
    /// Internal CDN base; fetches below it are rewritten to plain http since
    /// TLS terminates at the edge.
    pub cdn_base_url: Option<String>,
    pub max_input_size: usize, // bytes
    pub fetch_timeout: Duration,
}

impl Default for ThumbGateConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            public_dir: PathBuf::from("./public"),
            cdn_base_url: None,
            max_input_size: DEFAULT_MAX_INPUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cache directory cannot be empty")] EmptyCacheDir,
    #[error("Public directory cannot be empty")] EmptyPublicDir,
    #[error("Max input size must be > 0")] InvalidMaxInput,
}

impl ThumbGateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_dir.as_os_str().is_empty() { return Err(ConfigError::EmptyCacheDir); }
        if self.public_dir.as_os_str().is_empty() { return Err(ConfigError::EmptyPublicDir); }
        if self.max_input_size == 0 { return Err(ConfigError::InvalidMaxInput); }
        Ok(())
    }
}
