//! PNG encoding, artifact naming and writing artifacts to disk

use image::{ColorType, ImageEncoder, RgbaImage};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suggested file name of the animated export
pub const GIF_FILE_NAME: &str = "sprite-animation.gif";

/// Suggested file name of the archive export
pub const ARCHIVE_FILE_NAME: &str = "slices.zip";

/// Folder that groups the slices inside the archive
pub const ARCHIVE_DIR: &str = "slices";

/// Error type for output operations
#[derive(Debug, Error)]
pub enum OutputError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// A finished export: bytes plus the name it should be saved under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), bytes }
    }

    /// Write into `dir` under the suggested name, returning the full path.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf, OutputError> {
        let path = dir.join(&self.file_name);
        self.save_as(&path)?;
        Ok(path)
    }

    /// Write to an explicit path
    pub fn save_as(&self, path: &Path) -> Result<(), OutputError> {
        ensure_parent(path)?;
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Still-frame file name for a 0-based frame index (`slice_<index+1>.png`).
///
/// ```
/// assert_eq!(spriteslice::output::slice_file_name(0), "slice_1.png");
/// assert_eq!(spriteslice::output::slice_file_name(11), "slice_12.png");
/// ```
pub fn slice_file_name(index: u32) -> String {
    format!("slice_{}.png", index + 1)
}

/// Archive entry name for a 0-based frame index (`slices/slice_<index+1>.png`)
pub fn archive_entry_name(index: u32) -> String {
    format!("{}/{}", ARCHIVE_DIR, slice_file_name(index))
}

/// Encode an RGBA buffer as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, OutputError> {
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Save an RGBA image to a PNG file.
///
/// # Arguments
///
/// * `image` - The image to save
/// * `path` - The output file path
///
/// # Returns
///
/// * `Ok(())` on success
/// * `Err(OutputError)` on failure
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), OutputError> {
    ensure_parent(path)?;
    image.save(path)?;
    Ok(())
}

/// Create parent directories if they don't exist
fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Resolve where an export lands.
///
/// # Output Naming Rules
///
/// | Scenario | Output |
/// |----------|--------|
/// | No `-o` | `{sheet_dir}/{default_name}` |
/// | With `-o file.ext` | `file.ext` |
/// | With `-o dir/` or an existing directory | `dir/{default_name}` |
pub fn resolve_output_path(sheet: &Path, output_arg: Option<&Path>, default_name: &str) -> PathBuf {
    match output_arg {
        Some(output) => {
            let is_dir = output.as_os_str().to_string_lossy().ends_with('/') || output.is_dir();
            if is_dir {
                output.join(default_name)
            } else {
                output.to_path_buf()
            }
        }
        None => {
            let parent = sheet.parent().unwrap_or(Path::new(""));
            if parent.as_os_str().is_empty() {
                PathBuf::from(default_name)
            } else {
                parent.join(default_name)
            }
        }
    }
}
