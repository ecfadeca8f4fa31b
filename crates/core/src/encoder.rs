//! JPEG encoding of decoded frames.
//!
//! Encoding is a pure transformation: one [`DecodedImage`] in, one
//! [`EncodedFrame`] out, no I/O and no state carried between frames. A
//! failure here says nothing about the upstream connection, so callers
//! drop the frame and keep streaming.

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::error::{RelayError, Result};
use crate::source::DecodedImage;

/// Default JPEG quality (0–100 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// One compressed frame, owned by the write step and discarded after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Vec<u8>,
}

impl EncodedFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Fixed-quality JPEG encoder.
///
/// Quality is set once and never renegotiated. The encoder accepts 1–100;
/// values outside that range are clamped, so `0` behaves as `1`.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress one RGB frame.
    ///
    /// Returns [`RelayError::InvalidImage`] for empty or truncated buffers
    /// and [`RelayError::Encode`] if the codec rejects the frame.
    pub fn encode(&self, image: &DecodedImage) -> Result<EncodedFrame> {
        if image.width == 0
            || image.height == 0
            || image.expected_len() != Some(image.pixels.len())
        {
            return Err(RelayError::InvalidImage {
                width: image.width,
                height: image.height,
                len: image.pixels.len(),
            });
        }

        let mut bytes = Vec::with_capacity(image.pixels.len() / 8);
        JpegEncoder::new_with_quality(&mut bytes, self.quality).encode(
            &image.pixels,
            image.width,
            image.height,
            ExtendedColorType::Rgb8,
        )?;
        Ok(EncodedFrame::new(bytes))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}
