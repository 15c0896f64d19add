//! Warp/blend output tool
//!
//! Projects the rendered canvas onto the output surface through a grid-pin
//! warp with soft edges. The tool owns its calibration file and produces the
//! warped geometry the output pass draws each frame.

mod edge_blend;
mod mesh;

pub use edge_blend::{EdgeBlendConfig, EdgeBlendRegion};
pub use mesh::{WarpMesh, WarpPoint};

use std::fs;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quads per control-grid cell in the generated geometry
pub const SUBDIVISIONS: u32 = 8;

/// Errors raised by the warp/blend tool
#[derive(Debug, Error)]
pub enum WarpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
    #[error("warp mesh of {columns}x{rows} has {points} points")]
    InconsistentMesh {
        columns: usize,
        rows: usize,
        points: usize,
    },
}

/// Calibration persisted to `warp_blend.xml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "warpBlend")]
pub struct WarpBlendSettings {
    #[serde(default)]
    pub mesh: WarpMesh,
    #[serde(default)]
    pub blend: EdgeBlendConfig,
}

/// Vertex of the warped output geometry
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct WarpVertex {
    /// Clip-space position
    pub position: [f32; 2],
    /// Canvas texture coordinate, also the blend coordinate
    pub uv: [f32; 2],
}

impl WarpVertex {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // uv
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Triangulated output geometry
#[derive(Debug, Clone, Default)]
pub struct WarpGeometry {
    pub vertices: Vec<WarpVertex>,
    pub indices: Vec<u32>,
    /// Bumped whenever the geometry changes
    pub revision: u64,
}

/// Grid-pin warp with edge blending
pub struct WarpBlendTool {
    settings: WarpBlendSettings,
    canvas_size: Option<(u32, u32)>,
    geometry: WarpGeometry,
    dirty: bool,
    selected: Option<(usize, usize)>,
}

impl Default for WarpBlendTool {
    fn default() -> Self {
        Self::new(WarpBlendSettings::default())
    }
}

impl WarpBlendTool {
    pub fn new(settings: WarpBlendSettings) -> Self {
        Self {
            settings,
            canvas_size: None,
            geometry: WarpGeometry::default(),
            dirty: true,
            selected: None,
        }
    }

    /// Load calibration from `path`, keeping defaults when missing or invalid
    pub fn with_settings_file(path: &Path) -> Self {
        let mut tool = Self::default();
        if path.exists() {
            if let Err(e) = tool.load_settings(path) {
                log::warn!("Failed to load warp calibration from {:?}: {}", path, e);
            }
        }
        tool
    }

    /// Attach the canvas the tool projects
    pub fn bind(&mut self, width: u32, height: u32) {
        if self.canvas_size != Some((width, height)) {
            log::info!("Warp/blend bound to {}x{} canvas", width, height);
            self.canvas_size = Some((width, height));
            self.dirty = true;
        }
    }

    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.canvas_size
    }

    /// Current warped geometry, rebuilt when the mesh changed
    pub fn render(&mut self) -> &WarpGeometry {
        if self.dirty {
            let revision = self.geometry.revision + 1;
            self.geometry = build_geometry(&self.settings.mesh, SUBDIVISIONS);
            self.geometry.revision = revision;
            self.dirty = false;
        }
        &self.geometry
    }

    /// Brightness multiplier at output position `u, v`
    pub fn blend_factor(&self, u: f32, v: f32) -> f32 {
        self.settings.blend.factor(u, v)
    }

    pub fn settings(&self) -> &WarpBlendSettings {
        &self.settings
    }

    pub fn mesh(&self) -> &WarpMesh {
        &self.settings.mesh
    }

    /// Mutable mesh access; geometry is rebuilt on the next `render`
    pub fn mesh_mut(&mut self) -> &mut WarpMesh {
        self.dirty = true;
        &mut self.settings.mesh
    }

    pub fn blend(&self) -> &EdgeBlendConfig {
        &self.settings.blend
    }

    pub fn blend_mut(&mut self) -> &mut EdgeBlendConfig {
        &mut self.settings.blend
    }

    pub fn selected(&self) -> Option<(usize, usize)> {
        self.selected
    }

    /// Select the control point nearest to `position` within `radius`
    pub fn begin_drag(&mut self, position: [f32; 2], radius: f32) -> Option<(usize, usize)> {
        let mesh = &self.settings.mesh;
        let mut best: Option<((usize, usize), f32)> = None;
        for col in 0..mesh.columns {
            for row in 0..mesh.rows {
                let [x, y] = mesh.position(col, row);
                let d = ((x - position[0]).powi(2) + (y - position[1]).powi(2)).sqrt();
                if d <= radius && best.map_or(true, |(_, bd)| d < bd) {
                    best = Some(((col, row), d));
                }
            }
        }
        self.selected = best.map(|(point, _)| point);
        self.selected
    }

    /// Move the selected control point
    pub fn drag_to(&mut self, position: [f32; 2]) {
        if let Some((col, row)) = self.selected {
            self.settings
                .mesh
                .set_point_position(col, row, position[0], position[1]);
            self.dirty = true;
        }
    }

    pub fn end_drag(&mut self) {
        self.selected = None;
    }

    /// Reset the warp to identity, keeping the blend settings
    pub fn reset_warp(&mut self) {
        self.mesh_mut().reset();
    }

    pub fn load_settings(&mut self, path: &Path) -> Result<(), WarpError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: WarpBlendSettings = from_str(&contents)?;
        let mesh = &settings.mesh;
        if !mesh.is_consistent() {
            return Err(WarpError::InconsistentMesh {
                columns: mesh.columns,
                rows: mesh.rows,
                points: mesh.points.len(),
            });
        }
        settings.blend.sanitize();
        self.settings = settings;
        self.selected = None;
        self.dirty = true;
        log::info!("Loaded warp calibration from {:?}", path);
        Ok(())
    }

    pub fn save_settings(&self, path: &Path) -> Result<(), WarpError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let xml = to_string(&self.settings)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted)?;
        log::info!("Saved warp calibration to {:?}", path);
        Ok(())
    }
}

/// Subdivide every control cell into `subdivisions^2` quads
fn build_geometry(mesh: &WarpMesh, subdivisions: u32) -> WarpGeometry {
    let steps_x = (mesh.columns as u32 - 1) * subdivisions;
    let steps_y = (mesh.rows as u32 - 1) * subdivisions;
    let stride = steps_x + 1;

    let mut vertices = Vec::with_capacity(((steps_x + 1) * (steps_y + 1)) as usize);
    for iy in 0..=steps_y {
        for ix in 0..=steps_x {
            let u = ix as f32 / steps_x as f32;
            let v = iy as f32 / steps_y as f32;
            let [x, y] = mesh.sample(u, v);
            vertices.push(WarpVertex {
                position: [x * 2.0 - 1.0, 1.0 - y * 2.0],
                uv: [u, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((steps_x * steps_y * 6) as usize);
    for iy in 0..steps_y {
        for ix in 0..steps_x {
            let i = iy * stride + ix;
            indices.extend_from_slice(&[i, i + stride, i + 1, i + 1, i + stride, i + stride + 1]);
        }
    }

    WarpGeometry {
        vertices,
        indices,
        revision: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_geometry_covers_clip_space() {
        let mut tool = WarpBlendTool::default();
        tool.bind(1280, 800);
        let geometry = tool.render();

        let steps = 3 * SUBDIVISIONS + 1;
        assert_eq!(geometry.vertices.len(), (steps * steps) as usize);
        assert_eq!(geometry.indices.len(), ((steps - 1) * (steps - 1) * 6) as usize);

        let first = geometry.vertices[0];
        let last = geometry.vertices[geometry.vertices.len() - 1];
        assert_eq!(first.position, [-1.0, 1.0]);
        assert_eq!(first.uv, [0.0, 0.0]);
        assert_eq!(last.position, [1.0, -1.0]);
        assert_eq!(last.uv, [1.0, 1.0]);
    }

    #[test]
    fn test_render_rebuilds_only_when_dirty() {
        let mut tool = WarpBlendTool::default();
        let first = tool.render().revision;
        assert_eq!(tool.render().revision, first);

        tool.mesh_mut().set_point_position(0, 0, 0.2, 0.2);
        let geometry = tool.render();
        assert_eq!(geometry.revision, first + 1);
        let [x, y] = geometry.vertices[0].position;
        assert!((x + 0.6).abs() < 1e-5);
        assert!((y - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_drag_point() {
        let mut tool = WarpBlendTool::new(WarpBlendSettings {
            mesh: WarpMesh::new(2, 2),
            blend: EdgeBlendConfig::default(),
        });

        assert_eq!(tool.begin_drag([0.5, 0.5], 0.05), None);
        assert_eq!(tool.begin_drag([0.98, 0.03], 0.05), Some((1, 0)));
        tool.drag_to([0.9, 0.1]);
        tool.end_drag();

        assert_eq!(tool.mesh().position(1, 0), [0.9, 0.1]);
        assert_eq!(tool.selected(), None);

        tool.reset_warp();
        assert!(tool.mesh().is_identity());
    }

    #[test]
    fn test_blend_factor_uses_config() {
        let mut tool = WarpBlendTool::default();
        assert_eq!(tool.blend_factor(0.0, 0.5), 1.0);
        *tool.blend_mut() = EdgeBlendConfig::horizontal(0.2, 1.0);
        assert_eq!(tool.blend_factor(0.0, 0.5), 0.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("oakvvood_grid_warp_blend_test.xml");
        let mut tool = WarpBlendTool::default();
        tool.mesh_mut().resize(3, 2);
        tool.mesh_mut().set_point_position(1, 1, 0.4, 0.9);
        tool.blend_mut().left = EdgeBlendRegion::new(0.1, 1.8);
        tool.save_settings(&path).unwrap();

        let loaded = WarpBlendTool::with_settings_file(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.settings(), tool.settings());
    }

    #[test]
    fn test_inconsistent_mesh_rejected() {
        let path = std::env::temp_dir().join("oakvvood_grid_warp_blend_bad.xml");
        let mut settings = WarpBlendSettings::default();
        settings.mesh.points.pop();
        let xml = to_string(&settings).unwrap();
        std::fs::write(&path, xml).unwrap();

        let mut tool = WarpBlendTool::default();
        let result = tool.load_settings(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(WarpError::InconsistentMesh { points: 15, .. })));
        assert!(tool.mesh().is_consistent());
    }
}
