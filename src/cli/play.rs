//! Play command implementation

use std::io::{self, Write};
use std::process::ExitCode;

use crate::config::SliceConfig;
use crate::geometry::{compute_geometry, GeometryError};
use crate::playback::{AnimationLoop, DisplaySurface};
use crate::source::SourceImage;
use crate::terminal::{TerminalSurface, ANSI_RESET};

use super::{open_sheet, SheetArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the play command
pub fn run_play(
    args: &SheetArgs,
    config: &SliceConfig,
    cycles: Option<u32>,
    max_width: Option<u32>,
) -> ExitCode {
    if cycles.is_none() && !atty::is(atty::Stream::Stdout) {
        eprintln!("Error: stdout is not a terminal; pass --cycles to play a fixed number of loops");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    let source = match open_sheet(&args.sheet) {
        Ok(source) => source,
        Err(code) => return code,
    };

    let stdout = io::stdout();
    let mut surface = TerminalSurface::new(stdout.lock());
    if let Some(width) = max_width {
        surface = surface.with_max_width(width);
    }

    let result = play_cycles(&source, config, cycles, &mut surface);
    let mut out = surface.into_inner();
    let _ = write!(out, "{}", ANSI_RESET);
    let _ = out.flush();

    match result {
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Play `cycles` passes over every frame, or forever. Returns frames drawn.
fn play_cycles(
    source: &SourceImage,
    config: &SliceConfig,
    cycles: Option<u32>,
    surface: &mut dyn DisplaySurface,
) -> Result<u64, GeometryError> {
    let shape = config.grid.shape();
    let geometry = compute_geometry(source.size(), shape)?;
    let frames = match cycles {
        Some(cycles) => cycles as u64 * geometry.total_frames as u64,
        None => u64::MAX,
    };
    let mut animation = AnimationLoop::new(config.playback.fps, true);
    Ok(animation.run_frames(source, shape, surface, frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[derive(Default)]
    struct Recorder {
        size: (u32, u32),
        firsts: Vec<u8>,
    }

    impl DisplaySurface for Recorder {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn draw(&mut self, frame: &RgbaImage) {
            self.firsts.push(frame.get_pixel(0, 0)[0]);
        }
    }

    fn strip() -> SourceImage {
        let img = RgbaImage::from_fn(12, 3, |x, _| Rgba([(x / 3) as u8, 0, 0, 255]));
        SourceImage::from_rgba(img).unwrap()
    }

    #[test]
    fn test_play_cycles_draws_every_frame_in_order() {
        let mut config = SliceConfig::default();
        config.playback.fps = 60;
        let mut surface = Recorder::default();
        assert_eq!(play_cycles(&strip(), &config, Some(2), &mut surface).unwrap(), 8);
        assert_eq!(surface.firsts, vec![0, 1, 2, 3, 0, 1, 2, 3]);
        assert_eq!(surface.size, (3, 3));
    }

    #[test]
    fn test_play_cycles_rejects_invalid_grid() {
        let mut config = SliceConfig::default();
        config.grid.cols = 20;
        let mut surface = Recorder::default();
        assert!(play_cycles(&strip(), &config, Some(1), &mut surface).is_err());
        assert!(surface.firsts.is_empty());
    }
}
