//! Info command implementation

use serde::Serialize;
use std::process::ExitCode;

use crate::config::SliceConfig;
use crate::geometry::{compute_geometry, FrameGeometry};
use crate::playback::frame_delay;

use super::{open_sheet, SheetArgs, EXIT_ERROR, EXIT_SUCCESS};

#[derive(Serialize)]
struct InfoReport {
    sheet: String,
    width: u32,
    height: u32,
    #[serde(flatten)]
    geometry: FrameGeometry,
    fps: u32,
    frame_delay_ms: u64,
}

/// Execute the info command
pub fn run_info(args: &SheetArgs, config: &SliceConfig, json: bool) -> ExitCode {
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

    let report = InfoReport {
        sheet: args.sheet.display().to_string(),
        width: source.width(),
        height: source.height(),
        geometry,
        fps: config.playback.fps,
        frame_delay_ms: frame_delay(config.playback.fps).as_millis() as u64,
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        println!("Sheet:  {} ({}x{})", report.sheet, report.width, report.height);
        println!("Grid:   {} cols x {} rows", geometry.cols, geometry.rows);
        println!("Frame:  {}x{}", geometry.frame_width, geometry.frame_height);
        println!("Frames: {}", geometry.total_frames);
        println!("Speed:  {} fps ({}ms per frame)", report.fps, report.frame_delay_ms);
    }
    ExitCode::from(EXIT_SUCCESS)
}
