//! Effects pipeline editor

use super::{PatchTarget, UiAction};
use crate::patches::{BlendMode, PatchSettings};

/// Editor window for one pipeline's inputs and effect chain
pub struct PatchPanel {
    target: PatchTarget,
    /// Label for each input slot
    slot_names: &'static [&'static str],
}

impl PatchPanel {
    pub fn new(target: PatchTarget, slot_names: &'static [&'static str]) -> Self {
        Self { target, slot_names }
    }

    fn slot_name(&self, slot: usize) -> String {
        self.slot_names
            .get(slot)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Input {}", slot))
    }

    pub fn show(&mut self, ctx: &egui::Context, settings: &mut PatchSettings) -> Vec<UiAction> {
        let mut actions = Vec::new();
        let default_x = match self.target {
            PatchTarget::Pre => 320.0,
            PatchTarget::Post => 640.0,
        };

        egui::Window::new(self.target.title())
            .default_pos([default_x, 10.0])
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new("Inputs").strong());
                for (index, input) in settings.inputs.iter_mut().enumerate() {
                    ui.push_id(("input", index), |ui| {
                        ui.horizontal(|ui| {
                            ui.checkbox(&mut input.enabled, self.slot_name(input.slot));
                            egui::ComboBox::from_id_salt("blend")
                                .selected_text(input.blend.name())
                                .show_ui(ui, |ui| {
                                    for mode in BlendMode::all() {
                                        ui.selectable_value(&mut input.blend, *mode, mode.name());
                                    }
                                });
                        });
                        ui.add(egui::Slider::new(&mut input.opacity, 0.0..=1.0).text("Opacity"));
                    });
                }

                ui.add_space(4.0);
                ui.separator();
                ui.label(egui::RichText::new("Effects").strong());
                for (index, effect) in settings.effects.iter_mut().enumerate() {
                    ui.push_id(("effect", index), |ui| {
                        let mut active = !effect.bypassed;
                        if ui.checkbox(&mut active, effect.kind.name()).changed() {
                            effect.bypassed = !active;
                        }
                        ui.add_enabled_ui(active, |ui| {
                            let (amount_label, level_label) = effect.kind.parameter_labels();
                            ui.add(egui::Slider::new(&mut effect.amount, 0.0..=1.0).text(amount_label));
                            ui.add(egui::Slider::new(&mut effect.level, 0.0..=1.0).text(level_label));
                        });
                    });
                }

                ui.add_space(4.0);
                if ui.button("Save").clicked() {
                    actions.push(UiAction::SavePatch(self.target));
                }
            });

        actions
    }
}
