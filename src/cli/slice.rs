//! Slice command implementation

use rayon::prelude::*;
use std::path::Path;
use std::process::ExitCode;

use crate::config::SliceConfig;
use crate::extract::{extract_frame, AlphaMode};
use crate::geometry::compute_geometry;
use crate::output::{save_png, slice_file_name, OutputError};

use super::{open_sheet, slice_dir, SheetArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Execute the slice command
pub fn run_slice(args: &SheetArgs, config: &SliceConfig, output: Option<&Path>) -> ExitCode {
    let source = match open_sheet(&args.sheet) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let geometry = match compute_geometry(source.size(), config.grid.shape()) {
        Ok(geometry) => geometry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let out_dir = slice_dir(&args.sheet, output, config);

    let written: Result<Vec<_>, OutputError> = (0..geometry.total_frames)
        .into_par_iter()
        .map(|index| {
            let frame = extract_frame(&source, &geometry, index, AlphaMode::Preserve);
            let path = out_dir.join(slice_file_name(index));
            save_png(&frame, &path).map(|_| path)
        })
        .collect();

    match written {
        Ok(paths) => {
            for path in &paths {
                println!("Saved: {}", path.display());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
