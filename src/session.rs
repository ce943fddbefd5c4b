//! Slicing session - the one place UI state changes
//!
//! A [`Session`] owns the loaded sheet, the grid, the animation loop, the
//! preview scheduler and both exports. Every change goes through
//! [`Session::apply`], which works out what the change invalidates:
//!
//! | Update            | Previews         | Cursor | GIF result |
//! |-------------------|------------------|--------|------------|
//! | new sheet         | cleared, rebuilt | reset  | cleared    |
//! | grid change       | rebuilt          | reset  | kept       |
//! | fps change        | untouched        | kept   | kept       |
//! | play/pause/toggle | untouched        | kept   | kept       |

use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SliceConfig;
use crate::encoder::{AnimatedEncoder, ArchiveEncoder};
use crate::export::{
    ArchiveExport, ExportError, ExportInput, ExportStart, GifExport, JobStatus,
    DEFAULT_ENCODER_THREADS, DEFAULT_GIF_QUALITY,
};
use crate::geometry::{compute_geometry, FrameGeometry, GeometryError, GridShape};
use crate::playback::{AnimationLoop, DisplaySurface, PlaybackState};
use crate::preview::{PreviewScheduler, PreviewSnapshot, DEFAULT_DEBOUNCE};
use crate::source::SourceImage;

/// A single state change
#[derive(Debug, Clone)]
pub enum Update {
    /// Raw file bytes; decoded before anything else changes
    LoadImage(Vec<u8>),
    /// Already decoded sheet
    SetSource(SourceImage),
    SetGrid(GridShape),
    SetCols(u32),
    SetRows(u32),
    SetFps(u32),
    Play,
    Pause,
    TogglePlay,
}

/// Starting values for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub grid: GridShape,
    pub fps: u32,
    pub autoplay: bool,
    pub preview_debounce: Duration,
    pub gif_quality: i32,
    pub encoder_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            grid: GridShape::default(),
            fps: PlaybackState::default().fps,
            autoplay: true,
            preview_debounce: DEFAULT_DEBOUNCE,
            gif_quality: DEFAULT_GIF_QUALITY,
            encoder_threads: DEFAULT_ENCODER_THREADS,
        }
    }
}

impl From<&SliceConfig> for SessionOptions {
    fn from(config: &SliceConfig) -> Self {
        Self {
            grid: config.grid.shape(),
            fps: config.playback.fps,
            autoplay: config.playback.autoplay,
            preview_debounce: config.preview.debounce(),
            gif_quality: config.export.gif_quality,
            encoder_threads: config.export.encoder_threads,
        }
    }
}

pub struct Session {
    source: Option<SourceImage>,
    shape: GridShape,
    animation: AnimationLoop,
    previews: PreviewScheduler,
    gif: GifExport,
    archive: ArchiveExport,
}

impl Session {
    /// Create an empty session. Fails only if the preview worker cannot start.
    pub fn new(
        options: SessionOptions,
        encoder: Arc<dyn AnimatedEncoder>,
        archiver: Arc<dyn ArchiveEncoder>,
    ) -> io::Result<Self> {
        Ok(Self {
            source: None,
            shape: options.grid,
            animation: AnimationLoop::new(options.fps, options.autoplay),
            previews: PreviewScheduler::new(options.preview_debounce)?,
            gif: GifExport::new(encoder)
                .with_quality(options.gif_quality)
                .with_concurrency(options.encoder_threads),
            archive: ArchiveExport::new(archiver),
        })
    }

    /// Apply one update. Returns `false` when it was rejected and nothing
    /// changed (undecodable bytes).
    pub fn apply(&mut self, update: Update) -> bool {
        match update {
            Update::LoadImage(bytes) => match SourceImage::decode(&bytes) {
                Ok(source) => self.replace_source(source),
                Err(e) => {
                    warn!("ignoring sheet that failed to decode: {}", e);
                    return false;
                }
            },
            Update::SetSource(source) => self.replace_source(source),
            Update::SetGrid(shape) => self.change_grid(shape),
            Update::SetCols(cols) => self.change_grid(self.shape.with_cols(cols)),
            Update::SetRows(rows) => self.change_grid(self.shape.with_rows(rows)),
            Update::SetFps(fps) => {
                self.animation.set_fps(fps);
                debug!("fps set to {}", self.animation.state().fps);
            }
            Update::Play => self.animation.play(),
            Update::Pause => self.animation.pause(),
            Update::TogglePlay => self.animation.toggle(),
        }
        true
    }

    fn replace_source(&mut self, source: SourceImage) {
        info!("sheet loaded: {}x{}", source.width(), source.height());
        self.previews.clear();
        self.gif.clear();
        self.animation.reset();
        self.previews.schedule(source.clone(), self.shape);
        self.source = Some(source);
    }

    fn change_grid(&mut self, shape: GridShape) {
        if shape == self.shape {
            return;
        }
        debug!("grid set to {}x{}", shape.cols(), shape.rows());
        self.shape = shape;
        self.animation.reset();
        if let Some(source) = &self.source {
            self.previews.schedule(source.clone(), shape);
        }
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn playback(&self) -> PlaybackState {
        self.animation.state()
    }

    /// Geometry of the current sheet and grid, `None` when nothing is loaded
    pub fn geometry(&self) -> Option<Result<FrameGeometry, GeometryError>> {
        self.source.as_ref().map(|source| compute_geometry(source.size(), self.shape))
    }

    /// Drive the animation; see [`AnimationLoop::tick`]
    pub fn tick(&mut self, now: Instant, surface: &mut dyn DisplaySurface) -> Option<u32> {
        self.animation.tick(now, self.source.as_ref(), self.shape, surface)
    }

    /// When the animation next wants a tick
    pub fn next_deadline(&self) -> Option<Instant> {
        self.animation.next_deadline()
    }

    pub fn previews(&self) -> PreviewSnapshot {
        self.previews.snapshot()
    }

    /// Block until previews settle or `timeout` elapses
    pub fn wait_for_previews(&self, timeout: Duration) -> Option<PreviewSnapshot> {
        self.previews.wait_idle(timeout)
    }

    fn export_input(&self) -> Result<ExportInput, ExportError> {
        let source = self.source.clone().ok_or(ExportError::NoImage)?;
        Ok(ExportInput::new(source, self.shape, self.animation.state().fps)?)
    }

    /// Start a GIF export of the current sheet, grid and fps
    ///
    /// A request while a GIF export is running is ignored before the current
    /// state is looked at.
    pub fn export_gif(&self) -> Result<ExportStart, ExportError> {
        if self.gif.is_running() {
            info!("gif export already running, request ignored");
            return Ok(ExportStart::Ignored);
        }
        let input = self.export_input()?;
        self.gif.start(input)
    }

    /// Start a ZIP export of the current sheet and grid
    pub fn export_archive(&self) -> Result<ExportStart, ExportError> {
        if self.archive.is_running() {
            info!("zip export already running, request ignored");
            return Ok(ExportStart::Ignored);
        }
        let input = self.export_input()?;
        self.archive.start(input)
    }

    pub fn gif_status(&self) -> JobStatus {
        self.gif.status()
    }

    pub fn archive_status(&self) -> JobStatus {
        self.archive.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{GifEncoderService, ZipArchiver};
    use crate::output::encode_png;
    use image::{Rgba, RgbaImage};

    const WAIT: Duration = Duration::from_secs(10);

    fn session() -> Session {
        let options = SessionOptions { preview_debounce: Duration::from_millis(10), ..Default::default() };
        Session::new(
            options,
            Arc::new(GifEncoderService::initialized().unwrap()),
            Arc::new(ZipArchiver::new()),
        )
        .unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255]))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let s = session();
        assert_eq!(s.shape(), GridShape::new(4, 1));
        assert_eq!(s.playback(), PlaybackState { playing: true, fps: 10, cursor: 0 });
        assert!(s.geometry().is_none());
    }

    #[test]
    fn test_config_options() {
        let mut config = SliceConfig::default();
        config.grid.cols = 6;
        config.playback.fps = 24;
        config.playback.autoplay = false;
        let options = SessionOptions::from(&config);
        assert_eq!(options.grid, GridShape::new(6, 1));
        assert_eq!(options.fps, 24);
        assert!(!options.autoplay);
    }

    #[test]
    fn test_load_image_schedules_previews() {
        let mut s = session();
        assert!(s.apply(Update::LoadImage(png(40, 10))));
        let snapshot = s.wait_for_previews(WAIT).unwrap();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(s.geometry().unwrap().unwrap().frame_size(), (10, 10));
    }

    #[test]
    fn test_bad_bytes_leave_state_alone() {
        let mut s = session();
        s.apply(Update::LoadImage(png(40, 10)));
        s.wait_for_previews(WAIT).unwrap();

        assert!(!s.apply(Update::LoadImage(b"not an image".to_vec())));
        assert_eq!(s.source().unwrap().size(), (40, 10));
        assert_eq!(s.previews().len(), 4);
    }

    #[test]
    fn test_same_grid_is_a_no_op() {
        let mut s = session();
        s.apply(Update::LoadImage(png(40, 10)));
        let before = s.wait_for_previews(WAIT).unwrap().generation;
        s.apply(Update::SetCols(4));
        assert_eq!(s.previews().generation, before);
        assert!(!s.previews().loading);
    }

    #[test]
    fn test_export_without_sheet() {
        let s = session();
        assert!(matches!(s.export_gif(), Err(ExportError::NoImage)));
        assert!(matches!(s.export_archive(), Err(ExportError::NoImage)));
    }

    #[test]
    fn test_export_with_invalid_grid() {
        let mut s = session();
        s.apply(Update::LoadImage(png(10, 10)));
        s.apply(Update::SetGrid(GridShape::new(20, 1)));
        assert!(matches!(s.export_gif(), Err(ExportError::InvalidGeometry(_))));
        assert_eq!(s.gif_status(), JobStatus::Idle);
    }
}
