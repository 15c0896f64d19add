//! GPU rendering: the grid scene into the canvas, then the canvas through
//! the warp/blend geometry onto the surface.

mod camera;
mod scene;
mod warp_pass;

pub use camera::EasyCam;
pub use scene::{SceneOptions, SceneRenderer};
pub use warp_pass::WarpPass;

/// Offscreen canvas the scene is drawn into
pub const CANVAS_WIDTH: u32 = 1280;
pub const CANVAS_HEIGHT: u32 = 800;
pub const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
