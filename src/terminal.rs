//! Terminal rendering for animation playback
//!
//! Frames are drawn with the upper half block (`▀`): foreground is the top
//! pixel, background the bottom pixel, so each character cell shows two rows.
//! Requires a terminal with 24-bit color.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::warn;
use std::io::Write;

use crate::playback::DisplaySurface;

/// ANSI escape sequence to reset all formatting
pub const ANSI_RESET: &str = "\x1b[0m";

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";

/// Transparent pixels render as this 256-color gray
const TRANSPARENT_GRAY: u8 = 236;

/// Convert RGBA color to ANSI 24-bit background escape sequence.
///
/// Fully transparent colors render as a dark gray background.
///
/// ```
/// use spriteslice::terminal::color_to_ansi_bg;
/// use image::Rgba;
///
/// assert_eq!(color_to_ansi_bg(Rgba([255, 0, 0, 255])), "\x1b[48;2;255;0;0m");
/// assert_eq!(color_to_ansi_bg(Rgba([0, 0, 0, 0])), "\x1b[48;5;236m");
/// ```
pub fn color_to_ansi_bg(rgba: Rgba<u8>) -> String {
    if rgba[3] == 0 {
        format!("\x1b[48;5;{}m", TRANSPARENT_GRAY)
    } else {
        format!("\x1b[48;2;{};{};{}m", rgba[0], rgba[1], rgba[2])
    }
}

/// Foreground counterpart of [`color_to_ansi_bg`]
pub fn color_to_ansi_fg(rgba: Rgba<u8>) -> String {
    if rgba[3] == 0 {
        format!("\x1b[38;5;{}m", TRANSPARENT_GRAY)
    } else {
        format!("\x1b[38;2;{};{};{}m", rgba[0], rgba[1], rgba[2])
    }
}

/// Render an image using half blocks, one line per two pixel rows.
///
/// An odd last row is paired with a transparent pixel.
pub fn render_image_ansi(image: &RgbaImage) -> String {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return String::new();
    }

    let mut output = String::new();
    for y in (0..height).step_by(2) {
        for x in 0..width {
            let top = *image.get_pixel(x, y);
            let bottom = if y + 1 < height { *image.get_pixel(x, y + 1) } else { Rgba([0, 0, 0, 0]) };
            output.push_str(&color_to_ansi_bg(bottom));
            output.push_str(&color_to_ansi_fg(top));
            output.push('▀');
        }
        output.push_str(ANSI_RESET);
        output.push('\n');
    }
    output
}

/// Animation surface that paints frames into a terminal.
///
/// Resizing clears the screen; each draw repaints from the top-left corner
/// so frames replace each other in place.
pub struct TerminalSurface<W: Write> {
    out: W,
    size: (u32, u32),
    /// Frames wider than this are downscaled (nearest neighbour)
    max_width: Option<u32>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out, size: (0, 0), max_width: None }
    }

    /// Limit drawn width in terminal columns
    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width.max(1));
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_all(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("terminal write failed: {}", e);
        }
    }
}

impl<W: Write> DisplaySurface for TerminalSurface<W> {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.write_all(CLEAR_SCREEN);
    }

    fn draw(&mut self, frame: &RgbaImage) {
        let rendered = match self.max_width {
            Some(max) if frame.width() > max => {
                let height = ((frame.height() as u64 * max as u64) / frame.width() as u64).max(1);
                render_image_ansi(&imageops::resize(frame, max, height as u32, FilterType::Nearest))
            }
            _ => render_image_ansi(frame),
        };
        let mut text = String::with_capacity(CURSOR_HOME.len() + rendered.len());
        text.push_str(CURSOR_HOME);
        text.push_str(&rendered);
        self.write_all(&text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_to_ansi_fg() {
        assert_eq!(color_to_ansi_fg(Rgba([1, 2, 3, 255])), "\x1b[38;2;1;2;3m");
        assert_eq!(color_to_ansi_fg(Rgba([1, 2, 3, 0])), "\x1b[38;5;236m");
    }

    #[test]
    fn test_partial_alpha_is_opaque_color() {
        assert_eq!(color_to_ansi_bg(Rgba([10, 20, 30, 1])), "\x1b[48;2;10;20;30m");
    }

    #[test]
    fn test_render_two_rows_per_line() {
        let img = RgbaImage::from_fn(2, 4, |_, y| Rgba([y as u8, 0, 0, 255]));
        let rendered = render_image_ansi(&img);
        assert_eq!(rendered.lines().count(), 2);
        assert_eq!(rendered.matches('▀').count(), 4);
        assert!(rendered.starts_with("\x1b[48;2;1;0;0m\x1b[38;2;0;0;0m▀"));
    }

    #[test]
    fn test_render_odd_height_pads_transparent() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        assert_eq!(
            render_image_ansi(&img),
            "\x1b[48;5;236m\x1b[38;2;255;255;255m▀\x1b[0m\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_image_ansi(&RgbaImage::new(0, 0)), "");
    }

    #[test]
    fn test_surface_resize_clears_and_draw_homes() {
        let mut surface = TerminalSurface::new(Vec::new());
        surface.resize(2, 2);
        assert_eq!(surface.size(), (2, 2));
        surface.draw(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255])));

        let text = String::from_utf8(surface.into_inner()).unwrap();
        assert!(text.starts_with("\x1b[2J\x1b[H"));
        assert_eq!(text.matches('▀').count(), 2);
    }

    #[test]
    fn test_surface_downscales_wide_frames() {
        let mut surface = TerminalSurface::new(Vec::new()).with_max_width(4);
        surface.draw(&RgbaImage::from_pixel(16, 8, Rgba([9, 9, 9, 255])));
        let text = String::from_utf8(surface.into_inner()).unwrap();
        // 16x8 -> 4x2: one line of four cells
        assert_eq!(text.matches('▀').count(), 4);
        assert_eq!(text.lines().count(), 1);
    }
}
