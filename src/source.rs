//! Sprite sheet intake - decode raw bytes into an immutable source image

use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Raw bytes could not be turned into a sheet
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to read the file
    #[error("Failed to read sheet: {0}")]
    Io(#[from] std::io::Error),
    /// Bytes are not a recognised image format
    #[error("Not an image: {0}")]
    UnknownFormat(String),
    /// Recognised format but decoding failed
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    /// Decoded to an image with no pixels
    #[error("Image has no pixels")]
    Empty,
}

/// Decoded sprite sheet.
///
/// Cheap to clone: the pixels live behind an `Arc` so background previews and
/// exports can hold the sheet they started with while the session moves on.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: Arc<RgbaImage>,
}

impl SourceImage {
    /// Decode PNG, JPEG or any other format the `image` crate was built with.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let format = image::guess_format(bytes)
            .map_err(|e| DecodeError::UnknownFormat(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(bytes, format)?;
        Self::from_rgba(decoded.to_rgba8())
    }

    /// Read and decode a sheet from disk
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    /// Wrap an already decoded buffer
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, DecodeError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(DecodeError::Empty);
        }
        Ok(Self { pixels: Arc::new(pixels) })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Read-only pixel access
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Whether two handles refer to the same decoded sheet
    pub fn same_as(&self, other: &SourceImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::encode_png;
    use image::Rgba;

    #[test]
    fn test_decode_png_roundtrip_dimensions() {
        let img = RgbaImage::from_pixel(6, 3, Rgba([10, 20, 30, 255]));
        let bytes = encode_png(&img).unwrap();
        let source = SourceImage::decode(&bytes).unwrap();
        assert_eq!(source.size(), (6, 3));
        assert_eq!(*source.pixels().get_pixel(5, 2), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = SourceImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFormat(_)));
    }

    #[test]
    fn test_decode_truncated_png_fails() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&img).unwrap();
        assert!(SourceImage::decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_from_rgba_rejects_empty() {
        assert!(matches!(SourceImage::from_rgba(RgbaImage::new(0, 4)), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_clone_shares_pixels() {
        let source = SourceImage::from_rgba(RgbaImage::new(2, 2)).unwrap();
        let other = SourceImage::from_rgba(RgbaImage::new(2, 2)).unwrap();
        assert!(source.same_as(&source.clone()));
        assert!(!source.same_as(&other));
    }
}
