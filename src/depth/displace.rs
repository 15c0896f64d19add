//! Depth-driven vertex displacement

use thiserror::Error;

use super::ReducedDepthBuffer;
use crate::grid::GridMesh;

/// Height reached by a full-intensity depth pixel
pub const DISPLACEMENT_SCALE: f32 = 200.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplacementError {
    #[error("reduced depth buffer has {pixels} pixels but the mesh has {vertices} vertices")]
    SizeMismatch { pixels: usize, vertices: usize },
}

/// Height for a single red-channel value
pub fn height_for(red: u8) -> f32 {
    (red as f32 / 255.0) * DISPLACEMENT_SCALE
}

/// Set every vertex height from the matching reduced-buffer pixel
///
/// No vertex is touched when the counts differ.
pub fn apply_displacement(
    mesh: &mut GridMesh,
    buffer: &ReducedDepthBuffer,
) -> Result<(), DisplacementError> {
    let vertices = mesh.vertex_count();
    let pixels = buffer.pixel_count();
    if pixels != vertices {
        return Err(DisplacementError::SizeMismatch { pixels, vertices });
    }

    for (i, vertex) in mesh.vertices_mut().iter_mut().enumerate() {
        vertex.position[2] = height_for(buffer.red(i));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridLayout, GridParams};
    use image::{Rgba, RgbaImage};

    fn mesh() -> GridMesh {
        GridMesh::plane(GridLayout::new(GridParams::new(20, 1)).unwrap())
    }

    fn buffer_filled(width: u32, height: u32, red: u8) -> ReducedDepthBuffer {
        ReducedDepthBuffer::from_image(RgbaImage::from_pixel(width, height, Rgba([red, 0, 0, 255])))
    }

    #[test]
    fn test_mapping_is_linear() {
        assert_eq!(height_for(0), 0.0);
        assert!((height_for(255) - 200.0).abs() < 1e-4);
        assert!((height_for(128) - 100.392).abs() < 1e-3);
    }

    #[test]
    fn test_apply_sets_heights() {
        let mut mesh = mesh();
        let buffer = buffer_filled(33, 25, 255);
        apply_displacement(&mut mesh, &buffer).unwrap();
        assert!(mesh.heights().all(|z| (z - 200.0).abs() < 1e-4));
    }

    #[test]
    fn test_per_vertex_order() {
        let mut mesh = mesh();
        let image = RgbaImage::from_fn(33, 25, |x, y| Rgba([((x + y * 33) % 256) as u8, 0, 0, 255]));
        let buffer = ReducedDepthBuffer::from_image(image);
        apply_displacement(&mut mesh, &buffer).unwrap();

        for (i, z) in mesh.heights().enumerate() {
            assert_eq!(z, height_for((i % 256) as u8));
        }
    }

    #[test]
    fn test_idempotent() {
        let mut mesh = mesh();
        let buffer = buffer_filled(33, 25, 77);
        apply_displacement(&mut mesh, &buffer).unwrap();
        let first: Vec<f32> = mesh.heights().collect();
        apply_displacement(&mut mesh, &buffer).unwrap();
        let second: Vec<f32> = mesh.heights().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mismatch_leaves_mesh_untouched() {
        let mut mesh = mesh();
        let buffer = buffer_filled(32, 24, 255);
        let err = apply_displacement(&mut mesh, &buffer).unwrap_err();
        assert_eq!(
            err,
            DisplacementError::SizeMismatch {
                pixels: 32 * 24,
                vertices: 33 * 25
            }
        );
        assert!(mesh.heights().all(|z| z == 0.0));
    }
}
