//! Animation loop - cycles a frame cursor at a target frame rate
//!
//! # Timing Model
//!
//! The loop is driven by [`AnimationLoop::tick`], which the owner calls with
//! the current time. A freshly started (or restarted) loop draws the frame at
//! the cursor immediately and schedules the next advance `1000/fps` ms later.
//! Each advance is scheduled relative to the tick that performed it, so a
//! change of fps or sheet restarts the cadence cleanly instead of drifting.
//!
//! # Cursor Rules
//!
//! - Wraps modulo the frame count
//! - Resets to 0 when the sheet or grid changes ([`AnimationLoop::reset`])
//! - Survives pause/resume: resuming redraws the frozen frame first

use image::RgbaImage;
use log::trace;
use std::thread;
use std::time::{Duration, Instant};

use crate::extract::{extract_frame, AlphaMode};
use crate::geometry::{compute_geometry, FrameGeometry, GridShape};
use crate::source::SourceImage;

pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 60;

/// Clamp a requested frame rate into `MIN_FPS..=MAX_FPS`
pub fn clamp_fps(fps: u32) -> u32 {
    fps.clamp(MIN_FPS, MAX_FPS)
}

/// Time each frame stays on screen: `1000 / fps` milliseconds.
///
/// ```
/// use std::time::Duration;
/// use spriteslice::playback::frame_delay;
///
/// assert_eq!(frame_delay(10), Duration::from_millis(100));
/// assert_eq!(frame_delay(0), Duration::from_secs(1)); // clamped to 1 fps
/// ```
pub fn frame_delay(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / clamp_fps(fps) as u64)
}

/// Something frames can be drawn onto
pub trait DisplaySurface {
    /// Current size in pixels
    fn size(&self) -> (u32, u32);

    /// Change the size. May clear the surface.
    fn resize(&mut self, width: u32, height: u32);

    /// Replace the surface contents with `frame`
    fn draw(&mut self, frame: &RgbaImage);
}

/// Play/pause flag, frame rate and cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub playing: bool,
    pub fps: u32,
    pub cursor: u32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self { playing: true, fps: 10, cursor: 0 }
    }
}

/// Timer-driven frame cycler
#[derive(Debug, Clone)]
pub struct AnimationLoop {
    state: PlaybackState,
    /// When the cursor should next advance; `None` means draw immediately
    next_advance: Option<Instant>,
}

impl Default for AnimationLoop {
    fn default() -> Self {
        Self::new(PlaybackState::default().fps, true)
    }
}

impl AnimationLoop {
    pub fn new(fps: u32, playing: bool) -> Self {
        Self { state: PlaybackState { playing, fps: clamp_fps(fps), cursor: 0 }, next_advance: None }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn cursor(&self) -> u32 {
        self.state.cursor
    }

    /// Next scheduled advance, if the loop is running
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_advance
    }

    pub fn play(&mut self) {
        if !self.state.playing {
            self.state.playing = true;
            self.next_advance = None;
        }
    }

    /// Freeze on the last drawn frame
    pub fn pause(&mut self) {
        self.state.playing = false;
        self.next_advance = None;
    }

    pub fn toggle(&mut self) {
        if self.state.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Change the frame rate; the cadence restarts from the current cursor.
    pub fn set_fps(&mut self, fps: u32) {
        self.state.fps = clamp_fps(fps);
        self.next_advance = None;
    }

    /// New sheet or grid: back to frame 0 and restart the cadence.
    pub fn reset(&mut self) {
        self.state.cursor = 0;
        self.next_advance = None;
    }

    /// Advance the loop to `now`, drawing onto `surface` when a frame is due.
    ///
    /// Returns the index drawn, or `None` when nothing was drawn (paused, no
    /// sheet, invalid geometry, or simply not due yet). Invalid geometry never
    /// moves the cursor.
    pub fn tick(
        &mut self,
        now: Instant,
        source: Option<&SourceImage>,
        shape: GridShape,
        surface: &mut dyn DisplaySurface,
    ) -> Option<u32> {
        if !self.state.playing {
            return None;
        }
        let source = source?;
        let geometry = compute_geometry(source.size(), shape).ok()?;

        let advance = match self.next_advance {
            None => false,
            Some(due) if now >= due => true,
            Some(_) => return None,
        };

        self.state.cursor = if advance {
            (self.state.cursor + 1) % geometry.total_frames
        } else {
            geometry.wrap(self.state.cursor)
        };

        draw_frame(source, &geometry, self.state.cursor, surface);
        self.next_advance = Some(now + frame_delay(self.state.fps));
        trace!("animation drew frame {}", self.state.cursor);
        Some(self.state.cursor)
    }

    /// Play `frames` frames in real time, sleeping between them.
    ///
    /// Returns how many frames were drawn; 0 when the loop cannot run.
    pub fn run_frames(
        &mut self,
        source: &SourceImage,
        shape: GridShape,
        surface: &mut dyn DisplaySurface,
        frames: u64,
    ) -> u64 {
        let mut drawn = 0;
        while drawn < frames {
            if self.tick(Instant::now(), Some(source), shape, surface).is_some() {
                drawn += 1;
            } else if self.next_advance.is_none() {
                break;
            }
            if drawn == frames {
                break;
            }
            if let Some(due) = self.next_advance {
                let wait = due.saturating_duration_since(Instant::now());
                if !wait.is_zero() {
                    thread::sleep(wait);
                }
            }
        }
        drawn
    }
}

/// Resize lazily so unrelated redraws never clear the surface.
fn draw_frame(
    source: &SourceImage,
    geometry: &FrameGeometry,
    index: u32,
    surface: &mut dyn DisplaySurface,
) {
    let size = geometry.frame_size();
    if surface.size() != size {
        surface.resize(size.0, size.1);
    }
    let frame = extract_frame(source, geometry, index, AlphaMode::Preserve);
    surface.draw(&frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Records every call so tests can check draw order and resizes
    #[derive(Default)]
    struct RecordingSurface {
        size: (u32, u32),
        resizes: Vec<(u32, u32)>,
        drawn: Vec<Rgba<u8>>,
    }

    impl DisplaySurface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
            self.resizes.push((width, height));
        }

        fn draw(&mut self, frame: &RgbaImage) {
            self.drawn.push(*frame.get_pixel(0, 0));
        }
    }

    /// Horizontal strip where frame `i` is filled with red = i
    fn strip(frames: u32, size: u32) -> SourceImage {
        let img = RgbaImage::from_fn(frames * size, size, |x, _| Rgba([(x / size) as u8, 0, 0, 255]));
        SourceImage::from_rgba(img).unwrap()
    }

    fn red_values(surface: &RecordingSurface) -> Vec<u8> {
        surface.drawn.iter().map(|p| p[0]).collect()
    }

    #[test]
    fn test_frame_delay() {
        assert_eq!(frame_delay(1), Duration::from_secs(1));
        assert_eq!(frame_delay(60), Duration::from_micros(16_666));
        assert_eq!(frame_delay(500), frame_delay(60));
    }

    #[test]
    fn test_cursor_cycles_with_fps_spacing() {
        let source = strip(3, 4);
        let shape = GridShape::new(3, 1);
        let mut anim = AnimationLoop::new(10, true);
        let mut surface = RecordingSurface::default();
        let start = Instant::now();
        let step = Duration::from_millis(100);

        assert_eq!(anim.tick(start, Some(&source), shape, &mut surface), Some(0));
        // not due yet
        assert_eq!(anim.tick(start + Duration::from_millis(99), Some(&source), shape, &mut surface), None);

        let mut now = start;
        let mut seen = vec![0];
        for _ in 0..5 {
            now += step;
            seen.push(anim.tick(now, Some(&source), shape, &mut surface).unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(red_values(&surface), vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(anim.next_deadline(), Some(now + step));
    }

    #[test]
    fn test_resize_only_when_size_changes() {
        let source = strip(4, 8);
        let mut anim = AnimationLoop::new(30, true);
        let mut surface = RecordingSurface::default();
        let mut now = Instant::now();

        for _ in 0..6 {
            anim.tick(now, Some(&source), GridShape::new(4, 1), &mut surface);
            now += Duration::from_millis(40);
        }
        assert_eq!(surface.resizes, vec![(8, 8)]);

        anim.reset();
        anim.tick(now, Some(&source), GridShape::new(2, 1), &mut surface);
        assert_eq!(surface.resizes, vec![(8, 8), (16, 8)]);
    }

    #[test]
    fn test_reset_returns_to_first_frame() {
        let source = strip(4, 2);
        let shape = GridShape::new(4, 1);
        let mut anim = AnimationLoop::new(10, true);
        let mut surface = RecordingSurface::default();
        let mut now = Instant::now();
        for _ in 0..3 {
            anim.tick(now, Some(&source), shape, &mut surface);
            now += Duration::from_millis(100);
        }
        assert_eq!(anim.cursor(), 2);

        anim.reset();
        assert_eq!(anim.cursor(), 0);
        // redraws immediately, no waiting for the old deadline
        assert_eq!(anim.tick(now, Some(&source), shape, &mut surface), Some(0));
    }

    #[test]
    fn test_pause_freezes_and_resume_continues() {
        let source = strip(4, 2);
        let shape = GridShape::new(4, 1);
        let mut anim = AnimationLoop::new(10, true);
        let mut surface = RecordingSurface::default();
        let mut now = Instant::now();
        anim.tick(now, Some(&source), shape, &mut surface);
        now += Duration::from_millis(100);
        anim.tick(now, Some(&source), shape, &mut surface);

        anim.pause();
        now += Duration::from_secs(5);
        assert_eq!(anim.tick(now, Some(&source), shape, &mut surface), None);
        assert_eq!(anim.cursor(), 1);

        anim.toggle();
        assert!(anim.is_playing());
        assert_eq!(anim.tick(now, Some(&source), shape, &mut surface), Some(1));
        now += Duration::from_millis(100);
        assert_eq!(anim.tick(now, Some(&source), shape, &mut surface), Some(2));
    }

    #[test]
    fn test_fps_change_restarts_cadence() {
        let source = strip(4, 2);
        let shape = GridShape::new(4, 1);
        let mut anim = AnimationLoop::new(1, true);
        let mut surface = RecordingSurface::default();
        let now = Instant::now();
        anim.tick(now, Some(&source), shape, &mut surface);

        anim.set_fps(50);
        let later = now + Duration::from_millis(5);
        // redraw of the current frame right away, then 20ms cadence
        assert_eq!(anim.tick(later, Some(&source), shape, &mut surface), Some(0));
        assert_eq!(anim.next_deadline(), Some(later + Duration::from_millis(20)));
    }

    #[test]
    fn test_invalid_geometry_draws_nothing() {
        let source = strip(1, 10);
        let mut anim = AnimationLoop::new(10, true);
        let mut surface = RecordingSurface::default();
        let now = Instant::now();
        assert_eq!(anim.tick(now, Some(&source), GridShape::new(50, 50), &mut surface), None);
        assert_eq!(anim.cursor(), 0);
        assert!(surface.drawn.is_empty());
        assert!(surface.resizes.is_empty());
    }

    #[test]
    fn test_no_source_draws_nothing() {
        let mut anim = AnimationLoop::default();
        let mut surface = RecordingSurface::default();
        assert_eq!(anim.tick(Instant::now(), None, GridShape::default(), &mut surface), None);
    }

    #[test]
    fn test_run_frames_real_time() {
        let source = strip(2, 2);
        let mut anim = AnimationLoop::new(60, true);
        let mut surface = RecordingSurface::default();
        let started = Instant::now();
        let drawn = anim.run_frames(&source, GridShape::new(2, 1), &mut surface, 4);
        assert_eq!(drawn, 4);
        assert_eq!(red_values(&surface), vec![0, 1, 0, 1]);
        // three waits of ~16ms between four frames
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_run_frames_paused_returns_immediately() {
        let source = strip(2, 2);
        let mut anim = AnimationLoop::new(1, false);
        let mut surface = RecordingSurface::default();
        assert_eq!(anim.run_frames(&source, GridShape::new(2, 1), &mut surface, 10), 0);
    }
}
