use crate::ThumbGateError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage};

/// Decodes source bytes into a single opaque frame.
///
/// Animated GIFs decode to their first frame; any transparency is composited
/// over an opaque white background so the JPEG re-encode has no alpha to drop.
///
/// # Errors
/// Returns `ThumbGateError::TransformFailed` when the bytes defeat the
/// decoder despite having passed header sniffing (truncated or corrupt data).
pub fn flatten_image(bytes: &[u8]) -> Result<DynamicImage, ThumbGateError> {
    let guessed =
        image::guess_format(bytes).map_err(|e| ThumbGateError::TransformFailed(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, guessed)
        .map_err(|e| ThumbGateError::TransformFailed(e.to_string()))?;
    Ok(flatten_onto_white(img))
}

fn flatten_onto_white(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let mut out = RgbImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, image::Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    DynamicImage::ImageRgb8(out)
}

/// Crops and scales an image to the requested box.
///
/// # Behavior
/// - Both dimensions: aspect-preserving cover-scale, then center-crop to the
///   exact box (never a naive stretch)
/// - One dimension: scale that axis, the other follows proportionally
/// - Neither: return the image unchanged
///
/// Lanczos3 provides best quality for downsampling.
pub fn crop_thumbnail(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let filter = image::imageops::FilterType::Lanczos3;
    match (width, height) {
        (Some(w), Some(h)) => img.resize_to_fill(w, h, filter),
        (Some(w), None) => img.resize(w, u32::MAX, filter),
        (None, Some(h)) => img.resize(u32::MAX, h, filter),
        (None, None) => img,
    }
}

/// Encodes an image as JPEG at the given quality (clamped to [1, 100]).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ThumbGateError> {
    let q = quality.clamp(1, 100);
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();

    let mut out = Vec::new();
    let enc = JpegEncoder::new_with_quality(&mut out, q);
    enc.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
        .map_err(|e| ThumbGateError::TransformFailed(e.to_string()))?;
    Ok(out)
}
