//! Watch mode - re-slice a sheet whenever it changes on disk
//!
//! Provides file system watching with debouncing for `sslice watch`. The
//! sheet's parent directory is watched (editors often replace files rather
//! than writing in place) and events are filtered down to the sheet itself.

use log::{debug, info, warn};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::config::schema::WatchConfig;
use crate::preview::FramePreview;

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Channel receive error
    ChannelError(String),
    /// Sheet to watch does not exist
    SheetNotFound(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::ChannelError(msg) => write!(f, "Watch channel error: {}", msg),
            WatchError::SheetNotFound(path) => {
                write!(f, "Sprite sheet not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Sheet to watch
    pub sheet: PathBuf,
    /// Where slices are written
    pub out_dir: PathBuf,
    /// Watch configuration (debounce)
    pub config: WatchConfig,
}

/// Outcome of writing one preview set to disk
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SliceWriteResult {
    pub written: usize,
    /// Slices left over from a previous, larger grid
    pub removed: usize,
    pub duration: Duration,
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Write every preview into `out_dir` and delete stale `slice_<n>.png` files
/// whose number is past the end of the new set.
///
/// The watched `sheet` is never touched: a set that would overwrite it is
/// refused before anything is written, and pruning skips it.
pub fn write_slices(
    out_dir: &Path,
    frames: &[FramePreview],
    sheet: &Path,
) -> io::Result<SliceWriteResult> {
    let start = Instant::now();
    fs::create_dir_all(out_dir)?;
    let sheet = fs::canonicalize(sheet).unwrap_or_else(|_| sheet.to_path_buf());

    if let Some(frame) = frames.iter().find(|f| is_same_file(&out_dir.join(&f.file_name), &sheet)) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} would overwrite the watched sheet", frame.file_name),
        ));
    }

    for frame in frames {
        fs::write(out_dir.join(&frame.file_name), &frame.png)?;
    }

    let mut removed = 0;
    for entry in fs::read_dir(out_dir)? {
        let path = entry?.path();
        match slice_number(&path) {
            Some(n) if n > frames.len() && !is_same_file(&path, &sheet) => {
                fs::remove_file(&path)?;
                removed += 1;
            }
            _ => {}
        }
    }

    Ok(SliceWriteResult { written: frames.len(), removed, duration: start.elapsed() })
}

/// `canonical` must already be canonicalized
fn is_same_file(path: &Path, canonical: &Path) -> bool {
    fs::canonicalize(path).map_or(path == canonical, |p| p == canonical)
}

/// `slice_7.png` -> 7
fn slice_number(path: &Path) -> Option<usize> {
    path.file_name()?.to_str()?.strip_prefix("slice_")?.strip_suffix(".png")?.parse().ok()
}

/// Whether a debounced event path refers to the watched sheet
fn is_sheet_event(event_path: &Path, sheet: &Path) -> bool {
    if event_path == sheet {
        return true;
    }
    match (fs::canonicalize(event_path), fs::canonicalize(sheet)) {
        (Ok(a), Ok(b)) => a == b,
        _ => event_path.file_name().is_some() && event_path.file_name() == sheet.file_name(),
    }
}

/// Call `on_change` once up front and then after every debounced change to
/// the sheet, until it returns [`ControlFlow::Break`].
///
/// Blocks the calling thread.
pub fn watch_sheet<F>(options: &WatchOptions, mut on_change: F) -> Result<(), WatchError>
where
    F: FnMut(&Path) -> ControlFlow<()>,
{
    if !options.sheet.is_file() {
        return Err(WatchError::SheetNotFound(options.sheet.clone()));
    }
    let dir = match options.sheet.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if on_change(&options.sheet).is_break() {
        return Ok(());
    }

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
    debouncer.watcher().watch(&dir, RecursiveMode::NonRecursive).map_err(WatchError::WatchPath)?;
    info!("watching {} for changes", options.sheet.display());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed = events.iter().any(|e| {
                    matches!(e.kind, DebouncedEventKind::Any) && is_sheet_event(&e.path, &options.sheet)
                });
                if !changed {
                    continue;
                }
                debug!("{} changed", options.sheet.display());
                if on_change(&options.sheet).is_break() {
                    return Ok(());
                }
            }
            Ok(Err(error)) => {
                warn!("watch error: {:?}, continuing", error);
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}
