//! Watch command implementation

use log::warn;
use std::fs;
use std::ops::ControlFlow;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SliceConfig;
use crate::encoder::{GifEncoderService, ZipArchiver};
use crate::session::{Session, SessionOptions, Update};
use crate::watch::{format_duration, watch_sheet, write_slices, WatchOptions};

use super::{slice_dir, SheetArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Longest we wait for one preview run before giving up on that change
const PREVIEW_TIMEOUT: Duration = Duration::from_secs(60);

/// Execute the watch command
pub fn run_watch(args: &SheetArgs, config: &SliceConfig, output: Option<&Path>, once: bool) -> ExitCode {
    let mut session = match Session::new(
        SessionOptions::from(config),
        Arc::new(GifEncoderService::new()),
        Arc::new(ZipArchiver::new()),
    ) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let options = WatchOptions {
        sheet: args.sheet.clone(),
        out_dir: slice_dir(&args.sheet, output, config),
        config: config.watch.clone(),
    };

    if !once {
        println!("Watching {} (Ctrl+C to stop)", options.sheet.display());
    }
    let result = watch_sheet(&options, |sheet| {
        reslice(&mut session, sheet, &options.out_dir);
        if once {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Reload the sheet into the session and write whatever previews it settles on
fn reslice(session: &mut Session, sheet: &Path, out_dir: &Path) {
    let bytes = match fs::read(sheet) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("could not read {}: {}", sheet.display(), e);
            return;
        }
    };
    if !session.apply(Update::LoadImage(bytes)) {
        eprintln!("Skipped: {} is not a readable image, keeping previous slices", sheet.display());
        return;
    }

    let Some(snapshot) = session.wait_for_previews(PREVIEW_TIMEOUT) else {
        warn!("previews for {} did not settle in time", sheet.display());
        return;
    };
    if snapshot.is_empty() {
        if let Some(Err(e)) = session.geometry() {
            eprintln!("Skipped: {}", e);
        }
        return;
    }

    match write_slices(out_dir, &snapshot.frames, sheet) {
        Ok(result) => println!(
            "Sliced {} frames into {} in {}{}",
            result.written,
            out_dir.display(),
            format_duration(result.duration),
            if result.removed > 0 { format!(" ({} stale removed)", result.removed) } else { String::new() }
        ),
        Err(e) => eprintln!("Error: {}", e),
    }
}
