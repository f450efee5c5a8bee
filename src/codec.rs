use crate::config::THUMB_PATH;
use crate::ThumbGateError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// A thumbnail request decoded from an inbound filename.
///
/// The locator stays in its encoded form here; callers decode it with
/// [`decode_locator`] once they know the request is worth serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbRequest {
    /// `<locator>_<width>_<height>.jpg` — crop-and-scale to the given box.
    /// A dimension of 0 parses to `None`, meaning unconstrained on that axis.
    Sized {
        locator: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Anything else — serve the source bytes unmodified. The locator is
    /// everything before the first `.`.
    PassThrough { locator: String },
}

/// Encodes a source URL as a single URL-safe path segment.
///
/// Base64 with padding dropped and `+`/`/` swapped for `-`/`_`, so the result
/// survives use as a filename and round-trips exactly.
pub fn encode_locator(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

/// Inverse of [`encode_locator`]. Strips the thumbnail path prefix when the
/// caller hands us a full request path rather than a bare locator.
pub fn decode_locator(encoded: &str) -> Result<String, ThumbGateError> {
    let encoded = encoded.strip_prefix(THUMB_PATH).unwrap_or(encoded);
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| ThumbGateError::MalformedRequestName(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ThumbGateError::MalformedRequestName(e.to_string()))
}

/// Builds the request/output filename for a thumbnail of `url` at the given
/// box. Unconstrained dimensions render as 0 so the name stays parseable.
pub fn compose_thumbnail_name(url: &str, width: Option<u32>, height: Option<u32>) -> String {
    format!(
        "{}_{}_{}.jpg",
        encode_locator(url),
        width.unwrap_or(0),
        height.unwrap_or(0)
    )
}

// The locator alphabet after encoding, plus `+` for names minted by older
// encoders.
fn is_locator_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'+'
}

// Parses a dimension segment: all digits, 0 meaning unconstrained.
fn parse_dimension(s: &str) -> Option<Option<u32>> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = s.parse().ok()?;
    Some(if n == 0 { None } else { Some(n) })
}

/// Parses an inbound request filename into a [`ThumbRequest`].
///
/// Names matching `<locator>_<digits>_<digits>.jpg` become sized requests;
/// everything else is treated as a pass-through locator up to the first `.`.
/// A name yielding an empty locator is malformed and surfaces as not-found.
pub fn parse_request_name(name: &str) -> Result<ThumbRequest, ThumbGateError> {
    if let Some(stem) = name.strip_suffix(".jpg") {
        let mut parts = stem.rsplitn(3, '_');
        if let (Some(h), Some(w), Some(locator)) = (parts.next(), parts.next(), parts.next()) {
            if let (Some(height), Some(width)) = (parse_dimension(h), parse_dimension(w)) {
                if !locator.is_empty() && locator.bytes().all(is_locator_char) {
                    return Ok(ThumbRequest::Sized {
                        locator: locator.to_string(),
                        width,
                        height,
                    });
                }
            }
        }
    }

    let locator = name.split('.').next().unwrap_or("");
    if locator.is_empty() {
        return Err(ThumbGateError::MalformedRequestName(name.to_string()));
    }
    Ok(ThumbRequest::PassThrough {
        locator: locator.to_string(),
    })
}
