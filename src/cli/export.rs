//! Export command implementations (gif, zip)

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use crate::config::SliceConfig;
use crate::encoder::{GifEncoderService, ZipArchiver};
use crate::export::{ArchiveExport, ExportError, ExportInput, GifExport};
use crate::output::{Artifact, ARCHIVE_FILE_NAME, GIF_FILE_NAME};

use super::{export_path, open_sheet, SheetArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Execute the gif command
pub fn run_gif(args: &SheetArgs, config: &SliceConfig, output: Option<&Path>) -> ExitCode {
    let input = match export_input(args, config) {
        Ok(input) => input,
        Err(code) => return code,
    };
    let encoder = match GifEncoderService::initialized() {
        Ok(encoder) => encoder,
        Err(e) => {
            eprintln!("Error: {}: {}", ExportError::EncoderUnavailable, e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let export = GifExport::new(Arc::new(encoder))
        .with_quality(config.export.gif_quality)
        .with_concurrency(config.export.encoder_threads);

    let path = export_path(&args.sheet, output, config, GIF_FILE_NAME);
    finish(export.run(input), &path)
}

/// Execute the zip command
pub fn run_zip(args: &SheetArgs, config: &SliceConfig, output: Option<&Path>) -> ExitCode {
    let input = match export_input(args, config) {
        Ok(input) => input,
        Err(code) => return code,
    };
    let export = ArchiveExport::new(Arc::new(ZipArchiver::new()));

    let path = export_path(&args.sheet, output, config, ARCHIVE_FILE_NAME);
    finish(export.run(input), &path)
}

fn export_input(args: &SheetArgs, config: &SliceConfig) -> Result<ExportInput, ExitCode> {
    let source = open_sheet(&args.sheet)?;
    ExportInput::new(source, config.grid.shape(), config.playback.fps).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_ERROR)
    })
}

fn finish(result: Result<Option<Artifact>, ExportError>, path: &Path) -> ExitCode {
    let artifact = match result {
        Ok(Some(artifact)) => artifact,
        // A fresh export object never has a run in flight
        Ok(None) => return ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    match artifact.save_as(path) {
        Ok(()) => {
            println!("Saved: {} ({} bytes)", path.display(), artifact.bytes.len());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
