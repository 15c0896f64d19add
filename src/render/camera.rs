//! Orbit camera for the grid scene
//!
//! Starts looking straight at the mesh from the distance at which the canvas
//! height fills the field of view, like an untouched easy-cam.

use glam::{Mat4, Vec3};

const MIN_DISTANCE: f32 = 10.0;
const MAX_DISTANCE: f32 = 5000.0;
const PITCH_LIMIT: f32 = 1.4;

/// Orbit camera for the grid scene
pub struct EasyCam {
    /// Horizontal angle (yaw) in radians
    yaw: f32,
    /// Vertical angle (pitch) in radians, clamped to avoid gimbal lock
    pitch: f32,
    distance: f32,
    /// Distance restored by `reset`
    home_distance: f32,
    target: Vec3,
    aspect: f32,
    /// Vertical field of view in radians
    fov: f32,
    near: f32,
    far: f32,
}

impl EasyCam {
    /// Camera framing a viewport of `width x height` logical units
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let fov = 60f32.to_radians();
        let home_distance = (height as f32 / 2.0) / (fov / 2.0).tan();
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: home_distance,
            home_distance,
            target: Vec3::ZERO,
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fov,
            near: 1.0,
            far: MAX_DISTANCE * 2.0,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Calculate camera position from spherical coordinates
    pub fn eye_position(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    /// Handle mouse drag for orbit
    pub fn on_mouse_drag(&mut self, delta: (f32, f32), sensitivity: f32) {
        self.yaw -= delta.0 * sensitivity;
        self.pitch = (self.pitch + delta.1 * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Handle scroll for zoom
    pub fn on_scroll(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta * 0.1)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Back to the initial framing
    pub fn reset(&mut self) {
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.distance = self.home_distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_home_position() {
        let cam = EasyCam::for_viewport(1280, 800);
        let eye = cam.eye_position();
        assert!(eye.x.abs() < 1e-3);
        assert!(eye.y.abs() < 1e-3);
        assert!((eye.z - 692.82).abs() < 0.1);
    }

    #[test]
    fn test_origin_projects_to_centre() {
        let cam = EasyCam::for_viewport(1280, 800);
        let clip = cam.view_projection_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_canvas_height_fills_view() {
        let cam = EasyCam::for_viewport(1280, 800);
        let clip = cam.view_projection_matrix() * Vec4::new(0.0, 400.0, 0.0, 1.0);
        assert!((clip.y / clip.w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_is_clamped_and_reset() {
        let mut cam = EasyCam::for_viewport(1280, 800);
        for _ in 0..200 {
            cam.on_scroll(5.0);
        }
        assert_eq!(cam.distance(), MIN_DISTANCE);

        cam.on_mouse_drag((100.0, 1000.0), 0.01);
        cam.reset();
        assert!((cam.eye_position().z - 692.82).abs() < 0.1);
    }
}
