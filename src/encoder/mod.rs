//! Encoder services used by the export pipeline
//!
//! The pipeline only talks to the traits defined here. Two implementations
//! ship with the crate:
//! - [`GifEncoderService`] - looping animated GIF, encoded on a worker thread
//! - [`ZipArchiver`] - in-memory ZIP archive

mod archive;
mod gif;

pub use archive::ZipArchiver;
pub use gif::GifEncoderService;

use image::RgbaImage;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by encoder services
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The service was used before it was ready
    #[error("encoder is not ready")]
    NotReady,
    /// Frame does not match the configured canvas
    #[error("frame is {actual_w}x{actual_h}, encoder expects {expected_w}x{expected_h}")]
    FrameSize { expected_w: u32, expected_h: u32, actual_w: u32, actual_h: u32 },
    /// Image codec failure
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    /// Still frame could not be encoded
    #[error("frame encoding failed: {0}")]
    Still(#[from] crate::output::OutputError),
    /// Archive writer failure
    #[error("archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// IO error while writing entries
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Background encoder thread went away without a result
    #[error("encoder worker stopped unexpectedly")]
    WorkerLost,
}

/// Canvas and tuning for one animated encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    /// GIF sampling quality, 1 (best) to 30 (fastest)
    pub quality: i32,
    /// How many frames may be queued ahead of the worker
    pub concurrency: usize,
}

/// Factory for animated-image encodes
pub trait AnimatedEncoder: Send + Sync {
    /// Whether the service can accept work right now
    fn is_ready(&self) -> bool;

    /// Start a new encode with the given canvas
    fn configure(&self, config: EncoderConfig) -> Result<Box<dyn AnimatedSession>, EncodeError>;
}

/// One in-progress animated encode. Frames play in the order they are added.
pub trait AnimatedSession: Send {
    fn add_frame(&mut self, frame: RgbaImage, delay: Duration) -> Result<(), EncodeError>;

    /// Finish the encode and wait for the encoded bytes
    fn render(self: Box<Self>) -> Result<Vec<u8>, EncodeError>;
}

/// Factory for archives
pub trait ArchiveEncoder: Send + Sync {
    fn is_ready(&self) -> bool;

    fn create(&self) -> Result<Box<dyn ArchiveSession>, EncodeError>;
}

/// One in-progress archive
pub trait ArchiveSession: Send {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), EncodeError>;

    /// Close the archive and return its bytes
    fn finalize(self: Box<Self>) -> Result<Vec<u8>, EncodeError>;
}
