//! Configuration loading and discovery for `sslice.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SliceConfig;
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked for during discovery
pub const CONFIG_FILE_NAME: &str = "sslice.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse sslice.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub cols: Option<u32>,
    pub rows: Option<u32>,
    pub fps: Option<u32>,
}

/// Find sslice.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for sslice.toml
/// 2. Check XDG_CONFIG_HOME/spriteslice/sslice.toml (or ~/.config/spriteslice/sslice.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find sslice.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join("spriteslice").join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find sslice.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an sslice.toml file.
///
/// If a path is provided, loads from that file (and a missing file is an
/// error). Otherwise uses [`find_config`], falling back to defaults when no
/// file is found.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("art/sslice.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<SliceConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            debug!("loading config from {}", p.display());
            load_config_file(&p)
        }
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<SliceConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SliceConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Configuration used when no sslice.toml is found.
pub fn default_config() -> SliceConfig {
    SliceConfig::default()
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values. Grid and fps values
/// are stored as given; consumers clamp them. `export.out_dir` is never
/// overridden here: `-o` names a file for `gif`/`zip` and a directory for
/// `slice`/`watch`, so each command resolves it against the config itself.
pub fn merge_cli_overrides(config: &mut SliceConfig, overrides: &CliOverrides) {
    if let Some(cols) = overrides.cols {
        config.grid.cols = cols;
    }
    if let Some(rows) = overrides.rows {
        config.grid.rows = rows;
    }
    if let Some(fps) = overrides.fps {
        config.playback.fps = fps;
    }
}
