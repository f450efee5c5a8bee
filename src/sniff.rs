use crate::config::ImageType;
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Leading bytes needed to classify any supported format.
pub const SNIFF_LEN: usize = 10;

/// Classifies a byte buffer into an image type from its magic number alone.
///
/// This is the only trust boundary for "is this an image" — remote
/// Content-Type headers are never consulted. Buffers that match no known
/// signature return `None` and must not be cached or served.
pub fn classify(data: &[u8]) -> Option<ImageType> {
    if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
        return Some(ImageType::Jpeg);
    }
    if data.len() >= 4 && data[0] == 0x89 && &data[1..4] == b"PNG" {
        return Some(ImageType::Png);
    }
    if data.starts_with(b"GIF89a") || data.starts_with(b"GIF87a") {
        return Some(ImageType::Gif);
    }
    None
}

/// Classifies a local file by reading only its leading bytes.
pub async fn probe_file(path: &Path) -> io::Result<Option<ImageType>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; SNIFF_LEN];
    let mut read = 0;
    while read < SNIFF_LEN {
        let n = file.read(&mut head[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(classify(&head[..read]))
}
