//! Frame extraction - copy one grid cell out of a sheet into its own buffer

use image::{imageops, RgbaImage};

use crate::geometry::FrameGeometry;
use crate::source::SourceImage;

/// Alpha below this becomes fully transparent in [`AlphaMode::Binary`]
pub const ALPHA_THRESHOLD: u8 = 128;

/// How alpha is treated on an extracted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    /// Keep the sheet's alpha untouched
    #[default]
    Preserve,
    /// Snap alpha to 0 or 255 (palette encoders only support on/off transparency)
    Binary,
}

/// Extract the frame at `index` into a fresh `frame_width x frame_height` buffer.
///
/// The source is never modified. Alpha normalization, when requested, runs on
/// the copy.
///
/// # Panics
///
/// Panics if `index >= geometry.total_frames`.
///
/// # Examples
///
/// ```
/// use image::{Rgba, RgbaImage};
/// use spriteslice::extract::{extract_frame, AlphaMode};
/// use spriteslice::geometry::{compute_geometry, GridShape};
/// use spriteslice::source::SourceImage;
///
/// let mut sheet = RgbaImage::new(4, 2);
/// sheet.put_pixel(2, 0, Rgba([255, 0, 0, 255]));
/// let source = SourceImage::from_rgba(sheet).unwrap();
/// let geo = compute_geometry(source.size(), GridShape::new(2, 1)).unwrap();
///
/// let frame = extract_frame(&source, &geo, 1, AlphaMode::Preserve);
/// assert_eq!(frame.dimensions(), (2, 2));
/// assert_eq!(*frame.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
/// ```
pub fn extract_frame(
    source: &SourceImage,
    geometry: &FrameGeometry,
    index: u32,
    mode: AlphaMode,
) -> RgbaImage {
    let cell = geometry.cell(index);
    let mut frame = imageops::crop_imm(
        source.pixels(),
        cell.x,
        cell.y,
        geometry.frame_width,
        geometry.frame_height,
    )
    .to_image();

    if mode == AlphaMode::Binary {
        normalize_alpha(&mut frame);
    }
    frame
}

/// Snap every alpha value to 0 or 255 in place. Idempotent.
pub fn normalize_alpha(frame: &mut RgbaImage) {
    for pixel in frame.pixels_mut() {
        pixel[3] = if pixel[3] < ALPHA_THRESHOLD { 0 } else { 255 };
    }
}
