//! Warp/blend editor

use super::UiAction;
use crate::warp::{EdgeBlendRegion, WarpBlendTool};

const MIN_GRID: usize = 2;
const MAX_GRID: usize = 10;
const POINT_RADIUS: f32 = 6.0;

pub struct WarpPanel {
    columns: usize,
    rows: usize,
}

impl WarpPanel {
    pub fn new(tool: &WarpBlendTool) -> Self {
        Self {
            columns: tool.mesh().columns,
            rows: tool.mesh().rows,
        }
    }

    pub fn show(&mut self, ctx: &egui::Context, tool: &mut WarpBlendTool) -> Vec<UiAction> {
        let mut actions = Vec::new();

        egui::Window::new("Warp Blend")
            .default_pos([320.0, 10.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new("Warp").strong());
                ui.add(egui::Slider::new(&mut self.columns, MIN_GRID..=MAX_GRID).text("Columns"));
                ui.add(egui::Slider::new(&mut self.rows, MIN_GRID..=MAX_GRID).text("Rows"));
                ui.horizontal(|ui| {
                    let mesh = tool.mesh();
                    let reshaped = mesh.columns != self.columns || mesh.rows != self.rows;
                    if ui.add_enabled(reshaped, egui::Button::new("Apply")).clicked() {
                        actions.push(UiAction::ResizeWarp(self.columns, self.rows));
                    }
                    if ui.button("Reset").clicked() {
                        actions.push(UiAction::ResetWarp);
                    }
                });

                ui.add_space(4.0);
                ui.separator();
                ui.label(egui::RichText::new("Edge Blend").strong());
                let blend = tool.blend_mut();
                edge_controls(ui, "Left", &mut blend.left);
                edge_controls(ui, "Right", &mut blend.right);
                edge_controls(ui, "Top", &mut blend.top);
                edge_controls(ui, "Bottom", &mut blend.bottom);

                ui.add_space(4.0);
                if ui.button("Save").clicked() {
                    actions.push(UiAction::SaveWarp);
                }
            });

        actions
    }

    /// Follow a mesh replaced from outside the panel
    pub fn sync(&mut self, tool: &WarpBlendTool) {
        self.columns = tool.mesh().columns;
        self.rows = tool.mesh().rows;
    }
}

fn edge_controls(ui: &mut egui::Ui, label: &str, region: &mut EdgeBlendRegion) {
    ui.push_id(label, |ui| {
        ui.checkbox(&mut region.enabled, label);
        if region.enabled {
            let mut width = region.width;
            if ui.add(egui::Slider::new(&mut width, 0.0..=0.5).text("Width")).changed() {
                region.set_width(width);
            }
            let mut gamma = region.gamma;
            if ui.add(egui::Slider::new(&mut gamma, 0.1..=4.0).text("Gamma")).changed() {
                region.set_gamma(gamma);
            }
            let mut black = region.black_level;
            if ui.add(egui::Slider::new(&mut black, 0.0..=0.5).text("Black Level")).changed() {
                region.set_black_level(black);
            }
        }
    });
}

/// Draw the control points over everything, highlighting the selected one
pub fn draw_warp_points(ctx: &egui::Context, tool: &WarpBlendTool) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Foreground,
        egui::Id::new("warp_points"),
    ));
    let screen = ctx.screen_rect();
    let mesh = tool.mesh();
    let to_screen = |col: usize, row: usize| {
        let [x, y] = mesh.position(col, row);
        egui::pos2(
            screen.min.x + x * screen.width(),
            screen.min.y + y * screen.height(),
        )
    };

    let stroke = egui::Stroke::new(1.0, egui::Color32::from_gray(180));
    for row in 0..mesh.rows {
        for col in 0..mesh.columns {
            let p = to_screen(col, row);
            if col + 1 < mesh.columns {
                painter.line_segment([p, to_screen(col + 1, row)], stroke);
            }
            if row + 1 < mesh.rows {
                painter.line_segment([p, to_screen(col, row + 1)], stroke);
            }
        }
    }

    for row in 0..mesh.rows {
        for col in 0..mesh.columns {
            let color = if tool.selected() == Some((col, row)) {
                egui::Color32::YELLOW
            } else {
                egui::Color32::WHITE
            };
            painter.circle_filled(to_screen(col, row), POINT_RADIUS, color);
        }
    }
}
