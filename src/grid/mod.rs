//! Grid construction
//!
//! Turns the grid parameters chosen in the settings panel into the deformable
//! plane mesh and the guide-line overlay that marks its cell boundaries.

mod guide;
mod mesh;

pub use guide::{guide_line_positions, render_guide_lines, GuideLines, GUIDE_HEIGHT, GUIDE_WIDTH};
pub use mesh::{GridMesh, GridVertex};

use thiserror::Error;

/// Logical width covered by the mesh (depth sensor resolution)
pub const LOGICAL_WIDTH: u32 = 640;
/// Logical height covered by the mesh (depth sensor resolution)
pub const LOGICAL_HEIGHT: u32 = 480;

/// Smallest accepted grid division
pub const MIN_DIVISIONS: u32 = 3;
/// Largest accepted grid division
pub const MAX_DIVISIONS: u32 = 20;
/// Thinnest guide line in pixels
pub const MIN_THICKNESS: u32 = 1;
/// Thickest guide line in pixels
pub const MAX_THICKNESS: u32 = 10;

/// Errors raised while building a grid layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid divisions {0} outside {}..={}", MIN_DIVISIONS, MAX_DIVISIONS)]
    DivisionsOutOfRange(u32),
    #[error("guide thickness {0} outside {}..={}", MIN_THICKNESS, MAX_THICKNESS)]
    ThicknessOutOfRange(u32),
    #[error("grid of {columns}x{rows} cells is too coarse, at least 2x2 is required")]
    TooCoarse { columns: u32, rows: u32 },
}

/// Parameters that trigger a full grid rebuild when they change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridParams {
    /// Logical pixels per grid cell
    pub divisions: u32,
    /// Guide line thickness in pixels
    pub thickness: u32,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            divisions: 10,
            thickness: 1,
        }
    }
}

impl GridParams {
    pub fn new(divisions: u32, thickness: u32) -> Self {
        Self {
            divisions,
            thickness,
        }
    }

    /// Check both values against their declared ranges
    pub fn validate(&self) -> Result<(), GridError> {
        if !(MIN_DIVISIONS..=MAX_DIVISIONS).contains(&self.divisions) {
            return Err(GridError::DivisionsOutOfRange(self.divisions));
        }
        if !(MIN_THICKNESS..=MAX_THICKNESS).contains(&self.thickness) {
            return Err(GridError::ThicknessOutOfRange(self.thickness));
        }
        Ok(())
    }
}

/// Cell topology of the grid over a fixed logical area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    columns: u32,
    rows: u32,
    width: u32,
    height: u32,
}

impl GridLayout {
    /// Layout over the depth sensor's logical area
    pub fn new(params: GridParams) -> Result<Self, GridError> {
        Self::with_size(params, LOGICAL_WIDTH, LOGICAL_HEIGHT)
    }

    /// Layout over an arbitrary logical area
    ///
    /// `columns = width / divisions` and `rows = height / divisions` use integer
    /// division. Layouts with fewer than two columns or rows are rejected since
    /// the guide-line spacing divides by `columns - 1` and `rows - 1`.
    pub fn with_size(params: GridParams, width: u32, height: u32) -> Result<Self, GridError> {
        params.validate()?;

        let columns = width / params.divisions;
        let rows = height / params.divisions;
        if columns < 2 || rows < 2 {
            return Err(GridError::TooCoarse { columns, rows });
        }

        Ok(Self {
            columns,
            rows,
            width,
            height,
        })
    }

    /// Number of cells across
    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of cells down
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Logical width spanned by the mesh
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Logical height spanned by the mesh
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Vertices per row of the lattice
    pub fn lattice_width(&self) -> u32 {
        self.columns + 1
    }

    /// Vertex rows in the lattice
    pub fn lattice_height(&self) -> u32 {
        self.rows + 1
    }

    /// Total vertex count, `(columns + 1) * (rows + 1)`
    pub fn vertex_count(&self) -> usize {
        (self.lattice_width() * self.lattice_height()) as usize
    }

    /// Size of a single cell in logical units
    pub fn cell_size(&self) -> (f32, f32) {
        (
            self.width as f32 / self.columns as f32,
            self.height as f32 / self.rows as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = GridLayout::new(GridParams::default()).unwrap();
        assert_eq!(layout.columns(), 64);
        assert_eq!(layout.rows(), 48);
        assert_eq!(layout.vertex_count(), 65 * 49);
    }

    #[test]
    fn test_all_divisions_in_range() {
        for divisions in MIN_DIVISIONS..=MAX_DIVISIONS {
            let layout = GridLayout::new(GridParams::new(divisions, 1)).unwrap();
            assert!(layout.columns() >= 1);
            assert!(layout.rows() >= 1);
            assert_eq!(layout.columns(), LOGICAL_WIDTH / divisions);
            assert_eq!(layout.rows(), LOGICAL_HEIGHT / divisions);
            assert_eq!(
                layout.vertex_count(),
                ((layout.columns() + 1) * (layout.rows() + 1)) as usize
            );
        }
    }

    #[test]
    fn test_divisions_out_of_range() {
        assert_eq!(
            GridLayout::new(GridParams::new(2, 1)),
            Err(GridError::DivisionsOutOfRange(2))
        );
        assert_eq!(
            GridLayout::new(GridParams::new(21, 1)),
            Err(GridError::DivisionsOutOfRange(21))
        );
        assert_eq!(
            GridLayout::new(GridParams::new(10, 11)),
            Err(GridError::ThicknessOutOfRange(11))
        );
    }

    #[test]
    fn test_too_coarse_rejected() {
        // 30 / 20 = 1 column
        let result = GridLayout::with_size(GridParams::new(20, 1), 30, 480);
        assert_eq!(result, Err(GridError::TooCoarse { columns: 1, rows: 24 }));

        let result = GridLayout::with_size(GridParams::new(20, 1), 640, 39);
        assert_eq!(result, Err(GridError::TooCoarse { columns: 32, rows: 1 }));
    }

    #[test]
    fn test_cell_size() {
        let layout = GridLayout::new(GridParams::new(10, 1)).unwrap();
        let (w, h) = layout.cell_size();
        assert!((w - 10.0).abs() < 1e-5);
        assert!((h - 10.0).abs() < 1e-5);
    }
}
