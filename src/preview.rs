//! Debounced background regeneration of frame thumbnails
//!
//! Every call to [`PreviewScheduler::schedule`] bumps a generation counter and
//! hands the request to a worker thread. The worker waits for a quiet period
//! (the debounce window) before rendering; a newer request arriving inside the
//! window replaces the pending one and restarts the wait. A finished run only
//! publishes if its generation is still the current one, so stale results are
//! dropped rather than merged.

use log::{debug, trace, warn};
use rayon::prelude::*;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::extract::{extract_frame, AlphaMode};
use crate::geometry::{compute_geometry, GridShape};
use crate::output::{encode_png, slice_file_name, OutputError};
use crate::source::SourceImage;

/// Default quiet period before a preview run starts
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// One encoded thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePreview {
    pub index: u32,
    /// Suggested download name (`slice_<index+1>.png`)
    pub file_name: String,
    pub png: Vec<u8>,
}

/// What consumers see: a complete ordered preview set and a loading flag
#[derive(Debug, Clone, Default)]
pub struct PreviewSnapshot {
    /// Generation that produced `frames`
    pub generation: u64,
    pub frames: Arc<Vec<FramePreview>>,
    /// True while a run is pending or executing
    pub loading: bool,
}

impl PreviewSnapshot {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

struct Request {
    generation: u64,
    source: SourceImage,
    shape: GridShape,
}

struct Shared {
    /// Latest issued generation, readable without the lock
    current: AtomicU64,
    state: Mutex<PreviewSnapshot>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PreviewSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.current.load(Ordering::Acquire) != generation
    }

    /// Publish `frames` if `generation` is still current. Returns whether it was.
    fn publish(&self, generation: u64, frames: Vec<FramePreview>) -> bool {
        let mut state = self.lock();
        if self.is_stale(generation) {
            return false;
        }
        *state = PreviewSnapshot { generation, frames: Arc::new(frames), loading: false };
        self.changed.notify_all();
        true
    }
}

/// Why a run stopped without producing frames
enum RunAbort {
    Superseded,
    Encode(OutputError),
}

/// Debounced, cancelable preview generator.
pub struct PreviewScheduler {
    shared: Arc<Shared>,
    sender: Option<Sender<Request>>,
    worker: Option<JoinHandle<()>>,
    debounce: Duration,
}

impl PreviewScheduler {
    /// Start the worker thread with the given debounce window.
    pub fn new(debounce: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            current: AtomicU64::new(0),
            state: Mutex::new(PreviewSnapshot::default()),
            changed: Condvar::new(),
        });
        let (sender, receiver) = channel::<Request>();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new().name("sslice-preview".to_string()).spawn(move || {
            let mut pending: Option<Request> = None;
            loop {
                let request = match pending.take() {
                    None => match receiver.recv() {
                        Ok(request) => request,
                        Err(_) => break,
                    },
                    Some(waiting) => match receiver.recv_timeout(debounce) {
                        Ok(newer) => {
                            trace!(
                                "preview generation {} superseded by {} while debouncing",
                                waiting.generation,
                                newer.generation
                            );
                            newer
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            run_previews(&worker_shared, waiting);
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    },
                };
                pending = Some(request);
            }
            trace!("preview worker stopped");
        })?;

        Ok(Self { shared, sender: Some(sender), worker: Some(worker), debounce })
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Request a fresh preview set for `source` split by `shape`.
    ///
    /// Returns the generation assigned to the request. Any earlier pending or
    /// running generation becomes stale.
    pub fn schedule(&self, source: SourceImage, shape: GridShape) -> u64 {
        let generation = {
            let mut state = self.shared.lock();
            let generation = self.shared.current.fetch_add(1, Ordering::AcqRel) + 1;
            state.loading = true;
            self.shared.changed.notify_all();
            generation
        };
        debug!(
            "preview generation {} scheduled ({}x{} grid, {:?} debounce)",
            generation,
            shape.cols(),
            shape.rows(),
            self.debounce
        );

        let request = Request { generation, source, shape };
        if let Some(sender) = &self.sender {
            if sender.send(request).is_err() {
                warn!("preview worker is gone; generation {} dropped", generation);
                self.shared.lock().loading = false;
            }
        }
        generation
    }

    /// Drop the current previews and cancel anything pending.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        let generation = self.shared.current.fetch_add(1, Ordering::AcqRel) + 1;
        *state = PreviewSnapshot { generation, frames: Arc::new(Vec::new()), loading: false };
        self.shared.changed.notify_all();
    }

    /// Current published state
    pub fn snapshot(&self) -> PreviewSnapshot {
        self.shared.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    /// Block until no run is pending or executing, or `timeout` elapses.
    ///
    /// Returns the settled snapshot, or `None` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> Option<PreviewSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while state.loading {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            state = self
                .shared
                .changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Some(state.clone())
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.sender = None;
        self.shared.current.fetch_add(1, Ordering::AcqRel);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_previews(shared: &Shared, request: Request) {
    let Request { generation, source, shape } = request;
    if shared.is_stale(generation) {
        trace!("preview generation {} already stale, skipping", generation);
        return;
    }

    let started = Instant::now();
    let frames = match compute_geometry(source.size(), shape) {
        Ok(geometry) => {
            let rendered: Result<Vec<FramePreview>, RunAbort> = (0..geometry.total_frames)
                .into_par_iter()
                .map(|index| {
                    if shared.is_stale(generation) {
                        return Err(RunAbort::Superseded);
                    }
                    let frame = extract_frame(&source, &geometry, index, AlphaMode::Preserve);
                    let png = encode_png(&frame).map_err(RunAbort::Encode)?;
                    Ok(FramePreview { index, file_name: slice_file_name(index), png })
                })
                .collect();

            match rendered {
                Ok(frames) => frames,
                Err(RunAbort::Superseded) => {
                    debug!("preview generation {} superseded mid-run, discarded", generation);
                    return;
                }
                Err(RunAbort::Encode(e)) => {
                    warn!("preview generation {} failed: {}", generation, e);
                    Vec::new()
                }
            }
        }
        Err(e) => {
            debug!("preview generation {}: {}", generation, e);
            Vec::new()
        }
    };

    let count = frames.len();
    if shared.publish(generation, frames) {
        debug!(
            "preview generation {} published {} frames in {:?}",
            generation,
            count,
            started.elapsed()
        );
    } else {
        debug!("preview generation {} finished after being superseded, discarded", generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const WAIT: Duration = Duration::from_secs(10);

    fn sheet(width: u32, height: u32) -> SourceImage {
        let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        SourceImage::from_rgba(img).unwrap()
    }

    #[test]
    fn test_publishes_ordered_frames() {
        let scheduler = PreviewScheduler::new(Duration::from_millis(10)).unwrap();
        scheduler.schedule(sheet(40, 20), GridShape::new(4, 2));
        assert!(scheduler.is_loading());

        let snapshot = scheduler.wait_idle(WAIT).unwrap();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.len(), 8);
        for (i, preview) in snapshot.frames.iter().enumerate() {
            assert_eq!(preview.index, i as u32);
            assert_eq!(preview.file_name, format!("slice_{}.png", i + 1));
            let decoded = image::load_from_memory(&preview.png).unwrap().to_rgba8();
            assert_eq!(decoded.dimensions(), (10, 10));
        }
    }

    #[test]
    fn test_invalid_geometry_publishes_empty_set() {
        let scheduler = PreviewScheduler::new(Duration::from_millis(10)).unwrap();
        scheduler.schedule(sheet(10, 10), GridShape::new(50, 50));
        let snapshot = scheduler.wait_idle(WAIT).unwrap();
        assert!(snapshot.is_empty());
        assert!(!snapshot.loading);
    }

    #[test]
    fn test_burst_only_renders_last_request() {
        let scheduler = PreviewScheduler::new(Duration::from_millis(100)).unwrap();
        let source = sheet(60, 60);
        scheduler.schedule(source.clone(), GridShape::new(1, 1));
        scheduler.schedule(source.clone(), GridShape::new(2, 2));
        let last = scheduler.schedule(source, GridShape::new(3, 2));

        let snapshot = scheduler.wait_idle(WAIT).unwrap();
        assert_eq!(snapshot.generation, last);
        assert_eq!(snapshot.len(), 6);
    }

    #[test]
    fn test_clear_cancels_pending_run() {
        let scheduler = PreviewScheduler::new(Duration::from_millis(50)).unwrap();
        scheduler.schedule(sheet(20, 20), GridShape::new(2, 2));
        scheduler.clear();
        assert!(!scheduler.is_loading());

        thread::sleep(Duration::from_millis(200));
        let snapshot = scheduler.snapshot();
        assert!(snapshot.is_empty());
        assert!(!snapshot.loading);
    }

    #[test]
    fn test_wait_idle_times_out_while_debouncing() {
        let scheduler = PreviewScheduler::new(Duration::from_secs(5)).unwrap();
        scheduler.schedule(sheet(20, 20), GridShape::new(2, 2));
        assert!(scheduler.wait_idle(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn test_stale_publish_is_rejected() {
        let scheduler = PreviewScheduler::new(Duration::from_secs(5)).unwrap();
        let old = scheduler.schedule(sheet(20, 20), GridShape::new(2, 2));
        scheduler.schedule(sheet(20, 20), GridShape::new(1, 1));
        assert!(!scheduler.shared.publish(old, Vec::new()));
    }
}
