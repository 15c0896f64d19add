//! Planar grid mesh
//!
//! Vertices are stored row-major, starting at the top-left corner, so vertex
//! `i` lines up with pixel `i` of a raster sized to the lattice.

use bytemuck::{Pod, Zeroable};

use super::GridLayout;

/// Vertex for the deformable grid
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GridVertex {
    /// Position in logical units, z is the depth displacement
    pub position: [f32; 3],
    /// Texture coordinates into the normalized image
    pub uv: [f32; 2],
}

impl GridVertex {
    /// Size of vertex in bytes
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Vertex buffer layout for wgpu
    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Generated grid mesh
#[derive(Debug, Clone)]
pub struct GridMesh {
    layout: GridLayout,
    vertices: Vec<GridVertex>,
    triangle_indices: Vec<u32>,
    line_indices: Vec<u32>,
}

impl GridMesh {
    /// Flat plane of `columns x rows` cells centred on the origin
    ///
    /// Row 0 sits at `+height/2` so the mesh reads top-down like an image.
    pub fn plane(layout: GridLayout) -> Self {
        let columns = layout.columns();
        let rows = layout.rows();
        let stride = layout.lattice_width();
        let (cell_w, cell_h) = layout.cell_size();
        let half_w = layout.width() as f32 / 2.0;
        let half_h = layout.height() as f32 / 2.0;

        let mut vertices = Vec::with_capacity(layout.vertex_count());
        for iy in 0..=rows {
            for ix in 0..=columns {
                vertices.push(GridVertex {
                    position: [
                        -half_w + ix as f32 * cell_w,
                        half_h - iy as f32 * cell_h,
                        0.0,
                    ],
                    uv: [ix as f32 / columns as f32, iy as f32 / rows as f32],
                });
            }
        }

        let mut triangle_indices = Vec::with_capacity((columns * rows * 6) as usize);
        for iy in 0..rows {
            for ix in 0..columns {
                let top_left = iy * stride + ix;
                let top_right = top_left + 1;
                let bottom_left = top_left + stride;
                let bottom_right = bottom_left + 1;

                triangle_indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        let edge_count = (rows + 1) * columns + rows * (columns + 1) + rows * columns;
        let mut line_indices = Vec::with_capacity(edge_count as usize * 2);
        // Horizontal edges
        for iy in 0..=rows {
            for ix in 0..columns {
                let i = iy * stride + ix;
                line_indices.extend_from_slice(&[i, i + 1]);
            }
        }
        // Vertical edges
        for iy in 0..rows {
            for ix in 0..=columns {
                let i = iy * stride + ix;
                line_indices.extend_from_slice(&[i, i + stride]);
            }
        }
        // Diagonals shared by each cell's two triangles
        for iy in 0..rows {
            for ix in 0..columns {
                let top_right = iy * stride + ix + 1;
                line_indices.extend_from_slice(&[top_right, top_right + stride - 1]);
            }
        }

        Self {
            layout,
            vertices,
            triangle_indices,
            line_indices,
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn vertices(&self) -> &[GridVertex] {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut [GridVertex] {
        &mut self.vertices
    }

    /// Two triangles per cell
    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangle_indices
    }

    /// Every cell edge exactly once, as line-list pairs
    pub fn line_indices(&self) -> &[u32] {
        &self.line_indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Row-major index of the lattice point at column `ix`, row `iy`
    pub fn vertex_index(&self, ix: u32, iy: u32) -> usize {
        (iy * self.layout.lattice_width() + ix) as usize
    }

    /// Current height of every vertex in order
    pub fn heights(&self) -> impl Iterator<Item = f32> + '_ {
        self.vertices.iter().map(|v| v.position[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridParams, MAX_DIVISIONS, MIN_DIVISIONS};

    fn mesh(divisions: u32) -> GridMesh {
        GridMesh::plane(GridLayout::new(GridParams::new(divisions, 1)).unwrap())
    }

    #[test]
    fn test_vertex_count_matches_lattice() {
        for divisions in MIN_DIVISIONS..=MAX_DIVISIONS {
            let mesh = mesh(divisions);
            let layout = *mesh.layout();
            assert_eq!(
                mesh.vertex_count(),
                ((layout.columns() + 1) * (layout.rows() + 1)) as usize
            );
        }
    }

    #[test]
    fn test_default_grid_counts() {
        let mesh = mesh(10);
        assert_eq!(mesh.vertex_count(), 3185); // 65 * 49
        assert_eq!(mesh.triangle_indices().len(), 64 * 48 * 6);
        // 49 rows of 64 horizontal edges, 48 rows of 65 vertical edges, one diagonal per cell
        assert_eq!(mesh.line_indices().len(), (49 * 64 + 48 * 65 + 64 * 48) * 2);
    }

    #[test]
    fn test_plane_is_centred_and_flat() {
        let mesh = mesh(10);
        let first = mesh.vertices()[0];
        let last = mesh.vertices()[mesh.vertex_count() - 1];

        assert_eq!(first.position, [-320.0, 240.0, 0.0]);
        assert_eq!(first.uv, [0.0, 0.0]);
        assert!((last.position[0] - 320.0).abs() < 1e-3);
        assert!((last.position[1] + 240.0).abs() < 1e-3);
        assert_eq!(last.uv, [1.0, 1.0]);
        assert!(mesh.heights().all(|z| z == 0.0));
    }

    #[test]
    fn test_row_major_order() {
        let mesh = mesh(20);
        let i = mesh.vertex_index(3, 2);
        assert_eq!(i, 2 * 33 + 3);
        let v = mesh.vertices()[i];
        assert!((v.position[0] - (-320.0 + 3.0 * 20.0)).abs() < 1e-3);
        assert!((v.position[1] - (240.0 - 2.0 * 20.0)).abs() < 1e-3);
    }

    #[test]
    fn test_indices_in_bounds() {
        let mesh = mesh(7);
        let count = mesh.vertex_count() as u32;
        assert!(mesh.triangle_indices().iter().all(|&i| i < count));
        assert!(mesh.line_indices().iter().all(|&i| i < count));
    }

    #[test]
    fn test_wireframe_covers_triangle_edges() {
        let mesh = mesh(20);
        let lines: std::collections::HashSet<(u32, u32)> = mesh
            .line_indices()
            .chunks(2)
            .map(|pair| (pair[0].min(pair[1]), pair[0].max(pair[1])))
            .collect();

        for tri in mesh.triangle_indices().chunks(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                assert!(lines.contains(&(a.min(b), a.max(b))), "missing edge {}-{}", a, b);
            }
        }
        // No line is drawn twice
        assert_eq!(lines.len() * 2, mesh.line_indices().len());
        assert_eq!(lines.len(), 25 * 32 + 24 * 33 + 32 * 24);
    }
}
