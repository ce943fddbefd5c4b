//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod export;
mod info;
mod play;
mod slice;
mod watch;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::debug;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::config::{load_config, merge_cli_overrides, CliOverrides, SliceConfig};
use crate::output::resolve_output_path;
use crate::source::SourceImage;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Spriteslice - cut sprite sheets into frames, preview and export them
#[derive(Parser)]
#[command(name = "sslice")]
#[command(about = "Spriteslice - cut sprite sheets into frames, play them back, export GIF or ZIP")]
#[command(version)]
pub struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Use this sslice.toml instead of searching for one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Sheet and grid arguments shared by every command
#[derive(Args, Debug, Clone)]
pub struct SheetArgs {
    /// Sprite sheet image (PNG, JPEG, GIF, BMP, WebP)
    pub sheet: PathBuf,

    /// Number of columns (1-50) [default: from config, else 4]
    #[arg(long)]
    pub cols: Option<u32>,

    /// Number of rows (1-50) [default: from config, else 1]
    #[arg(long)]
    pub rows: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show sheet size and the frame layout for a grid
    Info {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write every frame as slice_<n>.png
    Slice {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Output directory [default: config export.out_dir, else next to the sheet]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a looping animated GIF
    Gif {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Frames per second (1-60)
        #[arg(long)]
        fps: Option<u32>,

        /// Output file or directory (ending with /)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export a ZIP of every frame under slices/
    Zip {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Output file or directory (ending with /)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Play the animation in the terminal
    Play {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Frames per second (1-60)
        #[arg(long)]
        fps: Option<u32>,

        /// Stop after this many passes over all frames [default: loop forever]
        #[arg(long)]
        cycles: Option<u32>,

        /// Downscale frames wider than this many columns
        #[arg(long)]
        max_width: Option<u32>,
    },

    /// Re-slice the sheet whenever it changes
    Watch {
        #[command(flatten)]
        sheet: SheetArgs,

        /// Output directory for slices
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Slice once and exit instead of watching
        #[arg(long)]
        once: bool,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Info { sheet, json } => {
            with_config(config_path, &sheet, None, |config| info::run_info(&sheet, config, json))
        }
        Commands::Slice { sheet, output } => with_config(config_path, &sheet, None, |config| {
            slice::run_slice(&sheet, config, output.as_deref())
        }),
        Commands::Gif { sheet, fps, output } => with_config(config_path, &sheet, fps, |config| {
            export::run_gif(&sheet, config, output.as_deref())
        }),
        Commands::Zip { sheet, output } => with_config(config_path, &sheet, None, |config| {
            export::run_zip(&sheet, config, output.as_deref())
        }),
        Commands::Play { sheet, fps, cycles, max_width } => {
            with_config(config_path, &sheet, fps, |config| {
                play::run_play(&sheet, config, cycles, max_width)
            })
        }
        Commands::Watch { sheet, output, once } => {
            with_config(config_path, &sheet, None, |config| {
                watch::run_watch(&sheet, config, output.as_deref(), once)
            })
        }
    }
}

/// `-v` count picks the default filter; `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

/// Load sslice.toml, apply the command line on top, then run `command`.
fn with_config<F>(path: Option<&Path>, sheet: &SheetArgs, fps: Option<u32>, command: F) -> ExitCode
where
    F: FnOnce(&SliceConfig) -> ExitCode,
{
    let mut config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let overrides = CliOverrides { cols: sheet.cols, rows: sheet.rows, fps };
    merge_cli_overrides(&mut config, &overrides);

    let errors = config.validate();
    if !errors.is_empty() {
        for error in errors {
            eprintln!("Error: {}", error.to_string().trim_start_matches("sslice.toml: "));
        }
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    debug!(
        "grid {}x{}, {} fps, preview debounce {}ms",
        config.grid.cols, config.grid.rows, config.playback.fps, config.preview.debounce_ms
    );
    command(&config)
}

/// Decode the sheet or print why not
fn open_sheet(path: &Path) -> Result<SourceImage, ExitCode> {
    SourceImage::open(path).map_err(|e| {
        eprintln!("Error: {}: {}", path.display(), e);
        ExitCode::from(EXIT_ERROR)
    })
}

/// Where an export goes: `-o`, then `export.out_dir`, then next to the sheet
fn export_path(sheet: &Path, output: Option<&Path>, config: &SliceConfig, default_name: &str) -> PathBuf {
    match (output, &config.export.out_dir) {
        (None, Some(dir)) => dir.join(default_name),
        _ => resolve_output_path(sheet, output, default_name),
    }
}

/// Directory for loose slice files
fn slice_dir(sheet: &Path, output: Option<&Path>, config: &SliceConfig) -> PathBuf {
    if let Some(dir) = output.or(config.export.out_dir.as_deref()) {
        return dir.to_path_buf();
    }
    match sheet.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
