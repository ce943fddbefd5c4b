//! Export pipeline - GIF and ZIP exports of every frame in a sheet
//!
//! Each export kind owns a job slot with a running flag: a start request
//! while the same kind is already running is ignored, not queued. The two
//! kinds share nothing mutable and may run at the same time.
//!
//! An export captures an [`ExportInput`] snapshot when it starts, so changing
//! the session's sheet or grid afterwards does not affect it. Frames are
//! extracted one at a time and handed straight to the encoder.

use log::{debug, info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;

use crate::encoder::{AnimatedEncoder, ArchiveEncoder, EncodeError, EncoderConfig};
use crate::extract::{extract_frame, AlphaMode};
use crate::geometry::{compute_geometry, FrameGeometry, GeometryError, GridShape};
use crate::output::{archive_entry_name, encode_png, Artifact, ARCHIVE_FILE_NAME, GIF_FILE_NAME};
use crate::playback::{clamp_fps, frame_delay};
use crate::source::SourceImage;

/// Default GIF sampling quality (1 = best)
pub const DEFAULT_GIF_QUALITY: i32 = 1;

/// Default number of frames queued ahead of the GIF worker
pub const DEFAULT_ENCODER_THREADS: usize = 2;

/// Export failures surfaced to the user
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing loaded to export
    #[error("no sprite sheet loaded")]
    NoImage,
    /// Grid does not fit the sheet
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),
    /// The animated-image encoder is not initialized
    #[error("GIF encoder is not ready yet, try again in a moment")]
    EncoderUnavailable,
    /// The archive encoder is not available
    #[error("archive encoder is not ready yet, try again in a moment")]
    ArchiverUnavailable,
    /// A step failed mid-run; nothing was produced
    #[error("export aborted{}: {source}", .frame.map(|i| format!(" at frame {}", i + 1)).unwrap_or_default())]
    ExportAborted {
        /// 0-based frame being processed, if the failure was per-frame
        frame: Option<u32>,
        #[source]
        source: EncodeError,
    },
    /// Could not start the export thread
    #[error("failed to start export worker: {0}")]
    Spawn(#[from] io::Error),
    /// Export thread panicked
    #[error("export worker panicked")]
    WorkerPanicked,
}

fn aborted(frame: Option<u32>) -> impl FnOnce(EncodeError) -> ExportError {
    move |source| ExportError::ExportAborted { frame, source }
}

/// Lifecycle of one export kind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Done(Artifact),
    /// Last run failed; a new run may be started
    Failed(String),
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running)
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            JobStatus::Done(artifact) => Some(artifact),
            _ => None,
        }
    }
}

/// Everything an export needs, captured when it starts
#[derive(Debug, Clone)]
pub struct ExportInput {
    pub source: SourceImage,
    pub geometry: FrameGeometry,
    pub fps: u32,
}

impl ExportInput {
    pub fn new(source: SourceImage, shape: GridShape, fps: u32) -> Result<Self, GeometryError> {
        let geometry = compute_geometry(source.size(), shape)?;
        Ok(Self { source, geometry, fps: clamp_fps(fps) })
    }
}

/// Result of a start request
#[derive(Debug)]
pub enum ExportStart {
    /// A new run is in flight
    Started(ExportHandle),
    /// Same kind already running; nothing was done
    Ignored,
}

impl ExportStart {
    pub fn is_ignored(&self) -> bool {
        matches!(self, ExportStart::Ignored)
    }

    /// Wait for the run if one was started
    pub fn wait(self) -> Option<Result<Artifact, ExportError>> {
        match self {
            ExportStart::Started(handle) => Some(handle.wait()),
            ExportStart::Ignored => None,
        }
    }
}

/// Handle to an in-flight export
#[derive(Debug)]
pub struct ExportHandle {
    worker: JoinHandle<Result<Artifact, ExportError>>,
}

impl ExportHandle {
    /// Block until the export finishes
    pub fn wait(self) -> Result<Artifact, ExportError> {
        self.worker.join().map_err(|_| ExportError::WorkerPanicked)?
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }
}

/// Running flag plus last status for one export kind
#[derive(Debug, Default)]
struct JobSlot {
    running: AtomicBool,
    status: Mutex<JobStatus>,
}

impl JobSlot {
    fn lock(&self) -> MutexGuard<'_, JobStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> JobStatus {
        self.lock().clone()
    }

    /// Run `work` on a named thread unless this kind is already running.
    fn launch<F>(self: &Arc<Self>, name: &str, work: F) -> Result<ExportStart, ExportError>
    where
        F: FnOnce() -> Result<Artifact, ExportError> + Send + 'static,
    {
        if self.running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
        {
            info!("{} already running, request ignored", name);
            return Ok(ExportStart::Ignored);
        }
        *self.lock() = JobStatus::Running;

        let slot = Arc::clone(self);
        let label = name.to_string();
        let spawned = thread::Builder::new().name(label.clone()).spawn(move || {
            let started = Instant::now();
            let result = work();
            let finished = match &result {
                Ok(artifact) => {
                    info!(
                        "{} finished: {} ({} bytes) in {:?}",
                        label,
                        artifact.file_name,
                        artifact.bytes.len(),
                        started.elapsed()
                    );
                    JobStatus::Done(artifact.clone())
                }
                Err(e) => {
                    warn!("{} failed: {}", label, e);
                    JobStatus::Failed(e.to_string())
                }
            };
            // Flag is released under the status lock: whoever sees the final
            // status can start a new run.
            let mut status = slot.lock();
            *status = finished;
            slot.running.store(false, Ordering::Release);
            drop(status);
            result
        });

        match spawned {
            Ok(worker) => Ok(ExportStart::Started(ExportHandle { worker })),
            Err(e) => {
                *self.lock() = JobStatus::Idle;
                self.running.store(false, Ordering::Release);
                Err(ExportError::Spawn(e))
            }
        }
    }

    /// Forget a finished artifact; a running job is left alone.
    fn clear(&self) {
        if !self.running.load(Ordering::Acquire) {
            *self.lock() = JobStatus::Idle;
        }
    }
}

/// Looping GIF export
pub struct GifExport {
    encoder: Arc<dyn AnimatedEncoder>,
    slot: Arc<JobSlot>,
    quality: i32,
    concurrency: usize,
}

impl GifExport {
    pub fn new(encoder: Arc<dyn AnimatedEncoder>) -> Self {
        Self {
            encoder,
            slot: Arc::default(),
            quality: DEFAULT_GIF_QUALITY,
            concurrency: DEFAULT_ENCODER_THREADS,
        }
    }

    /// GIF sampling quality, 1 (best) to 30 (fastest)
    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality.clamp(1, 30);
        self
    }

    /// Frames queued ahead of the encoder worker
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn status(&self) -> JobStatus {
        self.slot.status()
    }

    pub fn is_running(&self) -> bool {
        self.slot.running.load(Ordering::Acquire)
    }

    /// Drop a previous result (used when a new sheet is loaded)
    pub fn clear(&self) {
        self.slot.clear();
    }

    /// Start encoding `input` in the background.
    ///
    /// Fails with [`ExportError::EncoderUnavailable`] before doing anything if
    /// the encoder is not ready. Returns [`ExportStart::Ignored`] if a GIF
    /// export is already running.
    pub fn start(&self, input: ExportInput) -> Result<ExportStart, ExportError> {
        if self.is_running() {
            info!("GIF export already running, request ignored");
            return Ok(ExportStart::Ignored);
        }
        if !self.encoder.is_ready() {
            return Err(ExportError::EncoderUnavailable);
        }
        let encoder = Arc::clone(&self.encoder);
        let config = EncoderConfig {
            width: input.geometry.frame_width,
            height: input.geometry.frame_height,
            quality: self.quality,
            concurrency: self.concurrency,
        };
        debug!(
            "GIF export starting: {} frames of {}x{} at {} fps",
            input.geometry.total_frames, config.width, config.height, input.fps
        );
        self.slot.launch("sslice-gif-export", move || encode_gif(encoder.as_ref(), config, &input))
    }

    /// Start and wait. `Ok(None)` means a run was already in flight.
    pub fn run(&self, input: ExportInput) -> Result<Option<Artifact>, ExportError> {
        self.start(input)?.wait().transpose()
    }
}

fn encode_gif(
    encoder: &dyn AnimatedEncoder,
    config: EncoderConfig,
    input: &ExportInput,
) -> Result<Artifact, ExportError> {
    let geometry = &input.geometry;
    let delay = frame_delay(input.fps);
    let mut session = encoder.configure(config).map_err(aborted(None))?;

    for index in 0..geometry.total_frames {
        let frame = extract_frame(&input.source, geometry, index, AlphaMode::Binary);
        session.add_frame(frame, delay).map_err(aborted(Some(index)))?;
    }

    let bytes = session.render().map_err(aborted(None))?;
    Ok(Artifact::new(GIF_FILE_NAME, bytes))
}

/// ZIP archive of every frame as PNG
pub struct ArchiveExport {
    archiver: Arc<dyn ArchiveEncoder>,
    slot: Arc<JobSlot>,
}

impl ArchiveExport {
    pub fn new(archiver: Arc<dyn ArchiveEncoder>) -> Self {
        Self { archiver, slot: Arc::default() }
    }

    pub fn status(&self) -> JobStatus {
        self.slot.status()
    }

    pub fn is_running(&self) -> bool {
        self.slot.running.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.slot.clear();
    }

    /// Start archiving `input` in the background.
    ///
    /// Fails with [`ExportError::ArchiverUnavailable`] up front if the archiver
    /// is not ready. The first per-frame failure aborts the run and no archive
    /// is produced.
    pub fn start(&self, input: ExportInput) -> Result<ExportStart, ExportError> {
        if self.is_running() {
            info!("archive export already running, request ignored");
            return Ok(ExportStart::Ignored);
        }
        if !self.archiver.is_ready() {
            return Err(ExportError::ArchiverUnavailable);
        }
        let archiver = Arc::clone(&self.archiver);
        debug!("archive export starting: {} frames", input.geometry.total_frames);
        self.slot.launch("sslice-zip-export", move || encode_archive(archiver.as_ref(), &input))
    }

    /// Start and wait. `Ok(None)` means a run was already in flight.
    pub fn run(&self, input: ExportInput) -> Result<Option<Artifact>, ExportError> {
        self.start(input)?.wait().transpose()
    }
}

fn encode_archive(archiver: &dyn ArchiveEncoder, input: &ExportInput) -> Result<Artifact, ExportError> {
    let geometry = &input.geometry;
    let mut archive = archiver.create().map_err(aborted(None))?;

    for index in 0..geometry.total_frames {
        let frame = extract_frame(&input.source, geometry, index, AlphaMode::Preserve);
        let png = encode_png(&frame).map_err(|e| aborted(Some(index))(e.into()))?;
        archive.add_entry(&archive_entry_name(index), &png).map_err(aborted(Some(index)))?;
    }

    let bytes = archive.finalize().map_err(aborted(None))?;
    Ok(Artifact::new(ARCHIVE_FILE_NAME, bytes))
}
