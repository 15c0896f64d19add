//! Settings panel

use super::UiAction;
use crate::config::{AppSettings, MAX_CAMERA_SCALE, MIN_CAMERA_SCALE};
use crate::device::{MAX_TILT, MIN_TILT};
use crate::grid::{MAX_DIVISIONS, MAX_THICKNESS, MIN_DIVISIONS, MIN_THICKNESS};

/// Read-only values shown under the sliders
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub fps: f64,
    pub device_name: String,
    pub device_connected: bool,
    pub frame: u64,
    pub columns: u32,
    pub rows: u32,
}

#[derive(Default)]
pub struct SettingsPanel;

impl SettingsPanel {
    pub fn new() -> Self {
        Self
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        settings: &mut AppSettings,
        status: &StatusInfo,
    ) -> Vec<UiAction> {
        let mut actions = Vec::new();

        egui::Window::new("Settings")
            .default_pos([10.0, 10.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.add(
                    egui::Slider::new(&mut settings.kinect_angle, MIN_TILT..=MAX_TILT)
                        .text("Kinect Angle"),
                );
                ui.add(
                    egui::Slider::new(&mut settings.grid_divisions, MIN_DIVISIONS..=MAX_DIVISIONS)
                        .text("Grid Divisions"),
                );
                ui.add(
                    egui::Slider::new(&mut settings.grid_thickness, MIN_THICKNESS..=MAX_THICKNESS)
                        .text("Grid Thickness"),
                );
                ui.add(
                    egui::Slider::new(&mut settings.camera_scale, MIN_CAMERA_SCALE..=MAX_CAMERA_SCALE)
                        .text("Camera Scale"),
                );

                ui.checkbox(&mut settings.draw_wireframe, "Draw Wireframe");
                ui.checkbox(&mut settings.edit_textures, "Edit Textures");
                ui.checkbox(&mut settings.edit_warp_blend_tool, "Edit Warp Blend Tool");

                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        actions.push(UiAction::SaveSettings);
                    }
                    if ui.button("Reset Camera").clicked() {
                        actions.push(UiAction::ResetCamera);
                    }
                });

                ui.separator();
                ui.label(format!("FPS: {:.1}", status.fps));
                ui.label(format!(
                    "Device: {}{}",
                    status.device_name,
                    if status.device_connected { "" } else { " (disconnected)" }
                ));
                ui.label(format!("Grid: {}x{} cells", status.columns, status.rows));
                ui.label(format!("Frame: {}", status.frame));
            });

        actions
    }
}
