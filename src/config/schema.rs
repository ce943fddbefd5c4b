//! Configuration schema types for `sslice.toml`
//!
//! Defines the structure and validation rules for spriteslice configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::export::{DEFAULT_ENCODER_THREADS, DEFAULT_GIF_QUALITY};
use crate::geometry::{GridShape, MAX_GRID};
use crate::playback::{MAX_FPS, MIN_FPS};

/// Grid the sheet is cut into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Columns (1-50)
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Rows (1-50)
    #[serde(default = "default_rows")]
    pub rows: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cols: default_cols(), rows: default_rows() }
    }
}

impl GridConfig {
    pub fn shape(&self) -> GridShape {
        GridShape::new(self.cols, self.rows)
    }
}

fn default_cols() -> u32 {
    4
}

fn default_rows() -> u32 {
    1
}

/// Animation playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Frames per second (1-60), also used for GIF frame delays
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Start playing as soon as a sheet is loaded
    #[serde(default = "default_true")]
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { fps: default_fps(), autoplay: true }
    }
}

fn default_fps() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

/// Thumbnail regeneration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Quiet period before previews are regenerated
    #[serde(default = "default_preview_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { debounce_ms: default_preview_debounce_ms() }
    }
}

impl PreviewConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_preview_debounce_ms() -> u64 {
    500
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// GIF sampling quality, 1 (best) to 30 (fastest)
    #[serde(default = "default_gif_quality")]
    pub gif_quality: i32,
    /// Frames queued ahead of the GIF encoder worker
    #[serde(default = "default_encoder_threads")]
    pub encoder_threads: usize,
    /// Default directory for exports when `-o` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            gif_quality: default_gif_quality(),
            encoder_threads: default_encoder_threads(),
            out_dir: None,
        }
    }
}

fn default_gif_quality() -> i32 {
    DEFAULT_GIF_QUALITY
}

fn default_encoder_threads() -> usize {
    DEFAULT_ENCODER_THREADS
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay for file system events in milliseconds
    #[serde(default = "default_watch_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_watch_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_watch_debounce_ms() }
    }
}

/// Complete sslice.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SliceConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "grid.cols")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sslice.toml: '{}' {}", self.field, self.message)
    }
}

impl SliceConfig {
    /// Check ranges. Returns every problem found, empty when valid.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: String| {
            if !ok {
                errors.push(ConfigValidationError { field: field.to_string(), message });
            }
        };

        check(
            (1..=MAX_GRID).contains(&self.grid.cols),
            "grid.cols",
            format!("must be between 1 and {}", MAX_GRID),
        );
        check(
            (1..=MAX_GRID).contains(&self.grid.rows),
            "grid.rows",
            format!("must be between 1 and {}", MAX_GRID),
        );
        check(
            (MIN_FPS..=MAX_FPS).contains(&self.playback.fps),
            "playback.fps",
            format!("must be between {} and {}", MIN_FPS, MAX_FPS),
        );
        check(
            (1..=30).contains(&self.export.gif_quality),
            "export.gif_quality",
            "must be between 1 and 30".to_string(),
        );
        check(
            self.export.encoder_threads >= 1,
            "export.encoder_threads",
            "must be at least 1".to_string(),
        );

        errors
    }
}
