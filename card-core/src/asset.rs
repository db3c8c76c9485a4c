//! Image assets: encoded sources, decoded bitmaps and the decode boundary.
//!
//! A [`Bitmap`] keeps the encoded bytes it was decoded from so a template can
//! persist it as a self-contained data URI without re-encoding pixels.

use async_trait::async_trait;
use base64::Engine;

use crate::geometry::Size;
use crate::{CardError, CardResult};

/// Encoded image bytes together with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// MIME type such as `image/png`.
    pub mime: String,
    /// Raw encoded bytes.
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// Wrap raw bytes with a MIME type.
    #[must_use]
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Wrap raw bytes, sniffing the MIME type from magic bytes.
    #[must_use]
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self::new(mime, bytes)
    }

    /// Encode as a base64 `data:` URI.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{encoded}", self.mime)
    }

    /// Parse a `data:` URI (base64 or percent-encoded).
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] if the URI is malformed.
    pub fn from_data_uri(uri: &str) -> CardResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| CardError::DecodeFailure("Not a data URI".to_string()))?;
        let (metadata, payload) = rest.split_once(',').ok_or_else(|| {
            CardError::DecodeFailure("Invalid data URI: missing comma".to_string())
        })?;

        let is_base64 = metadata.ends_with(";base64");
        let mime = metadata.trim_end_matches(";base64");
        let bytes = if is_base64 {
            base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| CardError::DecodeFailure(format!("Failed to decode base64: {e}")))?
        } else {
            percent_decode(payload)?
        };

        let mime = if mime.is_empty() {
            sniff_mime(&bytes).to_string()
        } else {
            mime.to_string()
        };
        Ok(Self { mime, bytes })
    }
}

/// Best-effort MIME detection from magic bytes.
#[must_use]
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

fn percent_decode(input: &str) -> CardResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| CardError::DecodeFailure("Invalid URL encoding".to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// A decoded raster, exclusively owned by the slot that holds it.
///
/// Dropping the bitmap releases both the pixel buffer and its encoded source.
/// Deliberately not `Clone`: moving a bitmap into a slot transfers ownership.
#[derive(Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    source: EncodedImage,
}

impl Bitmap {
    /// Build a bitmap from RGBA pixels and the bytes it was decoded from.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] if the dimensions are zero or the
    /// pixel buffer does not hold `width * height` RGBA pixels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, source: EncodedImage) -> CardResult<Self> {
        if width == 0 || height == 0 {
            return Err(CardError::DecodeFailure("Image has no pixels".to_string()));
        }
        let expected = u64::from(width) * u64::from(height) * 4;
        if pixels.len() as u64 != expected {
            return Err(CardError::DecodeFailure(format!(
                "Pixel buffer holds {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            source,
        })
    }

    /// Pixel width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Pixel height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Intrinsic size as canvas units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    /// RGBA pixel data (4 bytes per pixel).
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The encoded bytes this bitmap was decoded from.
    #[must_use]
    pub const fn source(&self) -> &EncodedImage {
        &self.source
    }

    /// Self-contained reference used when persisting.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        self.source.to_data_uri()
    }
}

/// Decodes encoded image bytes into a [`Bitmap`].
///
/// Decoding suspends: callers request it and receive the bitmap later.
#[async_trait]
pub trait ImageDecoder: Send + Sync {
    /// Decode `source` into an owned bitmap.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::DecodeFailure`] for malformed input.
    async fn decode(&self, source: EncodedImage) -> CardResult<Bitmap>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_data_uri_round_trip() {
        let image = EncodedImage::sniff(PNG_MAGIC.to_vec());
        assert_eq!(image.mime, "image/png");
        let uri = image.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        let parsed = EncodedImage::from_data_uri(&uri).expect("parse");
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_percent_encoded_data_uri() {
        let parsed = EncodedImage::from_data_uri("data:text/plain,a%20b").expect("parse");
        assert_eq!(parsed.bytes, b"a b");
        assert_eq!(parsed.mime, "text/plain");
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(EncodedImage::from_data_uri("not a data uri").is_err());
        assert!(EncodedImage::from_data_uri("data:image/png").is_err());
        assert!(EncodedImage::from_data_uri("data:,%zz").is_err());
    }

    #[test]
    fn test_bitmap_rejects_short_buffer() {
        let source = EncodedImage::sniff(PNG_MAGIC.to_vec());
        let result = Bitmap::new(2, 2, vec![0; 15], source);
        assert!(matches!(result, Err(CardError::DecodeFailure(_))));
    }

    #[test]
    fn test_bitmap_rejects_empty() {
        let source = EncodedImage::sniff(PNG_MAGIC.to_vec());
        assert!(Bitmap::new(0, 4, Vec::new(), source).is_err());
    }
}
