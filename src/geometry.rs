//! Grid geometry - frame dimensions and offsets for a uniform sprite sheet grid
//!
//! Everything here is pure: a [`FrameGeometry`] is always derived from an
//! image size and a [`GridShape`] and is never stored on its own.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted column or row count
pub const MAX_GRID: u32 = 50;

/// Geometry could not be derived from the inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// A frame would be zero pixels wide or tall
    #[error(
        "invalid geometry: {width}x{height} image cannot be split into {cols}x{rows} frames"
    )]
    InvalidGeometry { width: u32, height: u32, cols: u32, rows: u32 },
}

/// Number of columns and rows the sheet is divided into.
///
/// Both values are kept within `1..=MAX_GRID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    cols: u32,
    rows: u32,
}

impl GridShape {
    /// Create a grid shape, clamping each dimension into `1..=MAX_GRID`.
    ///
    /// ```
    /// use spriteslice::geometry::GridShape;
    ///
    /// let shape = GridShape::new(0, 80);
    /// assert_eq!(shape.cols(), 1);
    /// assert_eq!(shape.rows(), 50);
    /// ```
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols: clamp_dim(cols), rows: clamp_dim(rows) }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of cells in the grid
    pub fn cell_count(&self) -> u32 {
        self.cols * self.rows
    }

    /// Same shape with a different column count
    pub fn with_cols(self, cols: u32) -> Self {
        Self::new(cols, self.rows)
    }

    /// Same shape with a different row count
    pub fn with_rows(self, rows: u32) -> Self {
        Self::new(self.cols, rows)
    }
}

impl Default for GridShape {
    fn default() -> Self {
        Self { cols: 4, rows: 1 }
    }
}

fn clamp_dim(value: u32) -> u32 {
    value.clamp(1, MAX_GRID)
}

/// Derived per-frame dimensions for one sheet and grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameGeometry {
    pub frame_width: u32,
    pub frame_height: u32,
    pub cols: u32,
    pub rows: u32,
    pub total_frames: u32,
}

/// Position of one frame inside the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCell {
    pub index: u32,
    pub col: u32,
    pub row: u32,
    /// Left edge in sheet pixels
    pub x: u32,
    /// Top edge in sheet pixels
    pub y: u32,
}

/// Compute frame geometry for a sheet of `(width, height)` pixels.
///
/// Frame sizes use floor division, so leftover pixels on the right and bottom
/// edges are never part of any frame.
///
/// # Examples
///
/// ```
/// use spriteslice::geometry::{compute_geometry, GridShape};
///
/// let geo = compute_geometry((400, 100), GridShape::new(4, 1)).unwrap();
/// assert_eq!((geo.frame_width, geo.frame_height), (100, 100));
/// assert_eq!(geo.total_frames, 4);
///
/// assert!(compute_geometry((10, 10), GridShape::new(50, 50)).is_err());
/// ```
pub fn compute_geometry(
    image_size: (u32, u32),
    shape: GridShape,
) -> Result<FrameGeometry, GeometryError> {
    let (width, height) = image_size;
    let (cols, rows) = (shape.cols(), shape.rows());
    let frame_width = width / cols;
    let frame_height = height / rows;

    if frame_width == 0 || frame_height == 0 {
        return Err(GeometryError::InvalidGeometry { width, height, cols, rows });
    }

    Ok(FrameGeometry { frame_width, frame_height, cols, rows, total_frames: cols * rows })
}

impl FrameGeometry {
    /// Locate the frame at `index` using row-major order.
    ///
    /// # Panics
    ///
    /// Panics if `index >= total_frames`. Use [`FrameGeometry::wrap`] first when
    /// the index comes from a free-running counter.
    pub fn cell(&self, index: u32) -> FrameCell {
        assert!(
            index < self.total_frames,
            "frame index {} out of range (0..{})",
            index,
            self.total_frames
        );
        let col = index % self.cols;
        let row = index / self.cols;
        FrameCell { index, col, row, x: col * self.frame_width, y: row * self.frame_height }
    }

    /// Wrap an arbitrary counter into `0..total_frames`
    pub fn wrap(&self, index: u32) -> u32 {
        index % self.total_frames
    }

    /// All cells in index order
    pub fn cells(&self) -> impl Iterator<Item = FrameCell> + '_ {
        (0..self.total_frames).map(move |i| self.cell(i))
    }

    /// Frame size as `(width, height)`
    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_grid_shape_clamps() {
        assert_eq!(GridShape::new(0, 0), GridShape::new(1, 1));
        assert_eq!(GridShape::new(51, 200).cols(), MAX_GRID);
        assert_eq!(GridShape::new(51, 200).rows(), MAX_GRID);
        assert_eq!(GridShape::new(7, 3).cell_count(), 21);
    }

    #[test]
    fn test_grid_shape_default_matches_tool() {
        let shape = GridShape::default();
        assert_eq!((shape.cols(), shape.rows()), (4, 1));
    }

    #[test]
    fn test_with_cols_and_rows() {
        let shape = GridShape::new(2, 2).with_cols(0).with_rows(9);
        assert_eq!((shape.cols(), shape.rows()), (1, 9));
    }

    #[test]
    fn test_horizontal_strip() {
        let geo = compute_geometry((400, 100), GridShape::new(4, 1)).unwrap();
        assert_eq!(geo.frame_size(), (100, 100));
        let xs: Vec<u32> = geo.cells().map(|c| c.x).collect();
        assert_eq!(xs, vec![0, 100, 200, 300]);
        assert!(geo.cells().all(|c| c.y == 0));
    }

    #[test]
    fn test_too_many_cells_is_invalid() {
        let err = compute_geometry((10, 10), GridShape::new(50, 50)).unwrap_err();
        assert_eq!(err, GeometryError::InvalidGeometry { width: 10, height: 10, cols: 50, rows: 50 });
    }

    #[test]
    fn test_one_invalid_axis_is_enough() {
        assert!(compute_geometry((100, 3), GridShape::new(2, 4)).is_err());
        assert!(compute_geometry((3, 100), GridShape::new(4, 2)).is_err());
    }

    #[test]
    fn test_floor_division_consistency() {
        for width in 1..=120u32 {
            for cols in 1..=12u32 {
                let shape = GridShape::new(cols, 1);
                match compute_geometry((width, 7), shape) {
                    Ok(geo) => {
                        assert!(geo.frame_width * cols <= width);
                        assert!(width < geo.frame_width * cols + cols);
                        assert_eq!(geo.total_frames, cols);
                    }
                    Err(_) => assert!(width < cols),
                }
            }
        }
    }

    #[test]
    fn test_row_major_bijection() {
        let geo = compute_geometry((70, 60), GridShape::new(7, 3)).unwrap();
        let mut seen = HashSet::new();
        for cell in geo.cells() {
            assert_eq!(cell.index, cell.row * geo.cols + cell.col);
            assert_eq!(cell.x, cell.col * geo.frame_width);
            assert_eq!(cell.y, cell.row * geo.frame_height);
            assert!(seen.insert((cell.col, cell.row)));
        }
        assert_eq!(seen.len() as u32, geo.total_frames);
    }

    #[test]
    fn test_wrap() {
        let geo = compute_geometry((40, 20), GridShape::new(2, 2)).unwrap();
        assert_eq!(geo.wrap(0), 0);
        assert_eq!(geo.wrap(4), 0);
        assert_eq!(geo.wrap(7), 3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_cell_out_of_range_panics() {
        let geo = compute_geometry((40, 20), GridShape::new(2, 2)).unwrap();
        geo.cell(4);
    }
}
