//! Bitmap decoding and encoding.
//!
//! Supports decoding images from raw bytes and base64-encoded data URIs.

use async_trait::async_trait;
use card_core::{Bitmap, CardResult, EncodedImage, ImageDecoder};
use image::ImageEncoder;

use crate::error::{RenderError, RenderResult};

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG with alpha support.
    Png,
    /// JPEG (no alpha).
    Jpeg,
    /// WebP (alpha support).
    WebP,
    /// GIF (first frame only).
    Gif,
    /// Unknown/other format.
    Unknown,
}

impl ImageFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "webp" => Self::WebP,
            "gif" => Self::Gif,
            _ => Self::Unknown,
        }
    }

    /// Detect format from MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "image/png" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::WebP,
            "image/gif" => Self::Gif,
            _ => Self::Unknown,
        }
    }

    /// Detect format from magic bytes.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        Self::from_mime(card_core::asset::sniff_mime(data))
    }

    /// Canonical MIME type, if known.
    #[must_use]
    pub const fn mime(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::WebP => Some("image/webp"),
            Self::Gif => Some("image/gif"),
            Self::Unknown => None,
        }
    }

    /// Whether an SVG rasterizer can embed this format directly.
    #[must_use]
    pub const fn embeddable(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::Gif)
    }
}

/// Decode encoded bytes into a [`Bitmap`].
///
/// The MIME type is taken from the magic bytes when the caller did not
/// supply a recognised one.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the image cannot be decoded.
pub fn decode_bitmap(mut source: EncodedImage) -> RenderResult<Bitmap> {
    let sniffed = ImageFormat::from_magic_bytes(&source.bytes);
    if ImageFormat::from_mime(&source.mime) == ImageFormat::Unknown {
        if let Some(mime) = sniffed.mime() {
            source.mime = mime.to_string();
        }
    }

    let img = image::load_from_memory(&source.bytes)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Bitmap::new(width, height, rgba.into_raw(), source)
        .map_err(|e| RenderError::Resource(e.to_string()))
}

/// Decode an image from a data URI.
///
/// Supports formats like: `data:image/png;base64,iVBORw0KGgo...`
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the data URI is malformed or the image
/// cannot be decoded.
pub fn load_bitmap_from_data_uri(uri: &str) -> RenderResult<Bitmap> {
    let source =
        EncodedImage::from_data_uri(uri).map_err(|e| RenderError::Resource(e.to_string()))?;
    decode_bitmap(source)
}

/// Encode RGBA pixels as PNG.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if encoding fails.
pub fn encode_png(width: u32, height: u32, rgba: &[u8]) -> RenderResult<Vec<u8>> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(rgba, width, height, image::ColorType::Rgba8.into())
        .map_err(|e| RenderError::Export(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// A data URI an SVG rasterizer can resolve for this bitmap.
///
/// The original bytes are reused when the format embeds directly; anything
/// else is re-encoded from pixels as PNG.
///
/// # Errors
///
/// Returns [`RenderError::Export`] if re-encoding fails.
pub fn embeddable_data_uri(bitmap: &Bitmap) -> RenderResult<String> {
    let source = bitmap.source();
    if ImageFormat::from_mime(&source.mime).embeddable() {
        return Ok(source.to_data_uri());
    }
    let png = encode_png(bitmap.width(), bitmap.height(), bitmap.pixels())?;
    Ok(EncodedImage::new("image/png", png).to_data_uri())
}

/// Shrink encoded image bytes so the longer side is at most `max_size`,
/// preserving aspect ratio. Smaller images are re-encoded unchanged.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the input cannot be decoded.
pub fn generate_thumbnail(data: &[u8], max_size: u32) -> RenderResult<EncodedImage> {
    let img = image::load_from_memory(data)
        .map_err(|e| RenderError::Resource(format!("Failed to decode image: {e}")))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let longer = width.max(height);

    let img = if longer > max_size {
        let ratio = f64::from(max_size) / f64::from(longer);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (w, h) = (
            ((f64::from(width) * ratio).round() as u32).max(1),
            ((f64::from(height) * ratio).round() as u32).max(1),
        );
        image::imageops::thumbnail(&img, w, h)
    } else {
        img
    };

    let (w, h) = img.dimensions();
    Ok(EncodedImage::new("image/png", encode_png(w, h, img.as_raw())?))
}

/// [`ImageDecoder`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl RasterDecoder {
    /// Create a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageDecoder for RasterDecoder {
    async fn decode(&self, source: EncodedImage) -> CardResult<Bitmap> {
        let bytes = source.bytes.len();
        let bitmap = decode_bitmap(source)?;
        tracing::debug!(
            "Decoded {bytes} bytes into {}x{} bitmap",
            bitmap.width(),
            bitmap.height()
        );
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 red pixel.
    const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn solid_png(width: u32, height: u32) -> Vec<u8> {
        let pixels = [255, 0, 0, 255].repeat((width * height) as usize);
        encode_png(width, height, &pixels).expect("encode")
    }

    #[test]
    fn test_format_detection_from_extension() {
        assert_eq!(ImageFormat::from_extension("png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("PNG"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("jpg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("jpeg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("webp"), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_extension("bmp"), ImageFormat::Unknown);
    }

    #[test]
    fn test_format_detection_from_mime() {
        assert_eq!(ImageFormat::from_mime("image/png"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_mime("image/JPEG"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_mime("image/webp"), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_mime("text/plain"), ImageFormat::Unknown);
    }

    #[test]
    fn test_format_detection_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormat::Png
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x00\x00\x00\x00WEBP"),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(&[1, 2]), ImageFormat::Unknown);
    }

    #[test]
    fn test_data_uri_decoding() {
        let bitmap = load_bitmap_from_data_uri(&format!("data:image/png;base64,{PNG_BASE64}"))
            .expect("decode");
        assert_eq!((bitmap.width(), bitmap.height()), (1, 1));
        assert_eq!(bitmap.pixels().len(), 4);
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(load_bitmap_from_data_uri("not a data uri").is_err());
        assert!(load_bitmap_from_data_uri("data:image/png").is_err());
    }

    #[test]
    fn test_mime_is_sniffed_when_missing() {
        let bitmap = decode_bitmap(EncodedImage::new("application/octet-stream", solid_png(3, 2)))
            .expect("decode");
        assert_eq!(bitmap.source().mime, "image/png");
    }

    #[test]
    fn test_corrupt_bytes_fail() {
        let result = decode_bitmap(EncodedImage::new("image/png", vec![0x89, 0x50, 0x4E, 0x47]));
        assert!(matches!(result, Err(RenderError::Resource(_))));
    }

    #[test]
    fn test_thumbnail_preserves_aspect_ratio() {
        let thumb = generate_thumbnail(&solid_png(40, 20), 10).expect("thumbnail");
        let bitmap = decode_bitmap(thumb).expect("decode");
        assert_eq!((bitmap.width(), bitmap.height()), (10, 5));
    }

    #[test]
    fn test_png_source_is_embedded_directly() {
        let bitmap =
            decode_bitmap(EncodedImage::new("image/png", solid_png(2, 2))).expect("decode");
        assert!(embeddable_data_uri(&bitmap)
            .expect("uri")
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_raster_decoder_maps_errors() {
        let decoder = RasterDecoder::new();
        let err = decoder
            .decode(EncodedImage::new("image/png", vec![1, 2, 3]))
            .await
            .expect_err("corrupt");
        assert!(matches!(err, card_core::CardError::DecodeFailure(_)));
    }
}
