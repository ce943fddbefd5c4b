//! Spriteslice - cut uniform-grid sprite sheets into frames
//!
//! This library provides functionality to:
//! - Decode a sheet and derive frame geometry from a column/row grid
//! - Extract individual frames, generate debounced thumbnail previews
//! - Play frames back at a fixed rate on any display surface
//! - Export a looping GIF or a ZIP of every frame as PNG

pub mod cli;
pub mod config;
pub mod encoder;
pub mod export;
pub mod extract;
pub mod geometry;
pub mod output;
pub mod playback;
pub mod preview;
pub mod session;
pub mod source;
pub mod terminal;
pub mod watch;
