//! Shared fixtures for unit tests.

use async_trait::async_trait;

use crate::asset::{Bitmap, EncodedImage, ImageDecoder};
use crate::{CardError, CardResult};

const TEST_MIME: &str = "image/x-test";

/// A tiny fake encoding: width and height as little-endian `u32`s.
pub fn test_source(width: u32, height: u32) -> EncodedImage {
    let mut bytes = width.to_le_bytes().to_vec();
    bytes.extend_from_slice(&height.to_le_bytes());
    EncodedImage::new(TEST_MIME, bytes)
}

fn pixels(width: u32, height: u32) -> Vec<u8> {
    (0..width * height * 4).map(|i| (i % 251) as u8).collect()
}

pub fn test_bitmap(width: u32, height: u32) -> Bitmap {
    Bitmap::new(width, height, pixels(width, height), test_source(width, height)).expect("bitmap")
}

/// Decodes [`test_source`] payloads.
pub struct TestDecoder;

#[async_trait]
impl ImageDecoder for TestDecoder {
    async fn decode(&self, source: EncodedImage) -> CardResult<Bitmap> {
        if source.mime != TEST_MIME || source.bytes.len() != 8 {
            return Err(CardError::DecodeFailure(format!("unsupported {}", source.mime)));
        }
        let width = u32::from_le_bytes([
            source.bytes[0],
            source.bytes[1],
            source.bytes[2],
            source.bytes[3],
        ]);
        let height = u32::from_le_bytes([
            source.bytes[4],
            source.bytes[5],
            source.bytes[6],
            source.bytes[7],
        ]);
        Bitmap::new(width, height, pixels(width, height), source)
    }
}

/// Rejects everything.
pub struct FailingDecoder;

#[async_trait]
impl ImageDecoder for FailingDecoder {
    async fn decode(&self, _source: EncodedImage) -> CardResult<Bitmap> {
        Err(CardError::DecodeFailure("corrupt".to_string()))
    }
}

/// Never finishes decoding.
pub struct StalledDecoder;

#[async_trait]
impl ImageDecoder for StalledDecoder {
    async fn decode(&self, _source: EncodedImage) -> CardResult<Bitmap> {
        std::future::pending().await
    }
}
