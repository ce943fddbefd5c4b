//! Spriteslice - command-line sprite sheet slicer

use std::process::ExitCode;

use spriteslice::cli;

fn main() -> ExitCode {
    cli::run()
}
