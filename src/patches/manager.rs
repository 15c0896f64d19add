//! CPU implementation of the effects pipeline

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::{EffectsPipeline, PatchEffect, PatchError, PatchSettings};

/// Multi-input CPU effects pipeline
pub struct PatchManager {
    name: String,
    slots: usize,
    settings: PatchSettings,
    width: u32,
    height: u32,
    allocated: bool,
    inputs: Vec<Option<RgbaImage>>,
    /// One runtime per entry of `settings.effects`
    runtimes: Vec<Box<dyn PatchEffect>>,
    output: RgbaImage,
    scratch: Vec<u8>,
    ticks: u64,
}

impl PatchManager {
    pub fn new(name: &str, slots: usize, settings: PatchSettings) -> Self {
        let mut manager = Self {
            name: name.to_string(),
            slots,
            settings,
            width: 0,
            height: 0,
            allocated: false,
            inputs: vec![None; slots],
            runtimes: Vec::new(),
            output: RgbaImage::new(0, 0),
            scratch: Vec::new(),
            ticks: 0,
        };
        manager.settings.sanitize(slots);
        manager.sync_runtimes();
        manager
    }

    /// Load settings from `path`, keeping `defaults` when the file is missing or invalid
    pub fn with_settings_file(name: &str, slots: usize, path: &Path, defaults: PatchSettings) -> Self {
        let mut manager = Self::new(name, slots, defaults);
        if path.exists() {
            if let Err(e) = manager.load_settings(path) {
                log::warn!("Failed to load {} settings from {:?}: {}", name, path, e);
            }
        } else {
            log::info!("No {} settings at {:?}, using defaults", name, path);
        }
        manager
    }

    pub fn settings(&self) -> &PatchSettings {
        &self.settings
    }

    /// Mutable access for the editor; runtimes follow on the next `update`
    pub fn settings_mut(&mut self) -> &mut PatchSettings {
        &mut self.settings
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Number of completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Rebuild runtimes when the effect list no longer lines up with them
    fn sync_runtimes(&mut self) {
        let in_sync = self.runtimes.len() == self.settings.effects.len()
            && self
                .runtimes
                .iter()
                .zip(&self.settings.effects)
                .all(|(runtime, effect)| runtime.kind() == effect.kind);
        if in_sync {
            return;
        }

        log::debug!(
            "Rebuilding {} effect chain ({} effects)",
            self.name,
            self.settings.effects.len()
        );
        self.runtimes = self
            .settings
            .effects
            .iter()
            .map(|effect| effect.kind.create_runtime())
            .collect();
    }

    /// Composite enabled inputs in order onto a transparent canvas
    fn composite(&self) -> Vec<u8> {
        let pixel_count = (self.width * self.height) as usize;
        let mut canvas = vec![[0.0f32; 4]; pixel_count];

        for input in &self.settings.inputs {
            if !input.enabled {
                continue;
            }
            let Some(Some(image)) = self.inputs.get(input.slot) else {
                continue;
            };

            for (dst, src) in canvas.iter_mut().zip(image.pixels()) {
                let src = [
                    src[0] as f32 / 255.0,
                    src[1] as f32 / 255.0,
                    src[2] as f32 / 255.0,
                    src[3] as f32 / 255.0,
                ];
                *dst = input.blend.blend(*dst, src, input.opacity);
            }
        }

        canvas
            .iter()
            .flat_map(|px| px.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

impl EffectsPipeline for PatchManager {
    fn allocate(&mut self, width: u32, height: u32) {
        log::info!("Allocating {} pipeline at {}x{}", self.name, width, height);
        self.width = width;
        self.height = height;
        self.allocated = true;
        self.output = RgbaImage::new(width, height);
        self.inputs = vec![None; self.slots];
        // Stateful effects must not carry frames of the old size
        self.runtimes.clear();
        self.sync_runtimes();
    }

    fn set_input_image(&mut self, image: &RgbaImage, slot: usize) -> Result<(), PatchError> {
        if slot >= self.slots {
            return Err(PatchError::SlotOutOfRange {
                slot,
                slots: self.slots,
            });
        }
        if !self.allocated {
            return Err(PatchError::NotAllocated(self.name.clone()));
        }

        let fitted = if image.dimensions() == (self.width, self.height) {
            image.clone()
        } else {
            imageops::resize(image, self.width, self.height, FilterType::Triangle)
        };
        self.inputs[slot] = Some(fitted);
        Ok(())
    }

    fn update(&mut self) -> Result<(), PatchError> {
        if !self.allocated {
            return Err(PatchError::NotAllocated(self.name.clone()));
        }
        self.sync_runtimes();

        let mut current = self.composite();
        self.scratch.resize(current.len(), 0);

        for (effect, runtime) in self.settings.effects.iter().zip(self.runtimes.iter_mut()) {
            if effect.bypassed {
                continue;
            }
            runtime.process(
                &current,
                &mut self.scratch,
                self.width,
                self.height,
                &effect.params(),
            );
            std::mem::swap(&mut current, &mut self.scratch);
        }

        // Buffer length is width * height * 4 by construction
        if let Some(output) = RgbaImage::from_raw(self.width, self.height, current) {
            self.output = output;
        }
        self.ticks += 1;
        Ok(())
    }

    fn output_image(&self) -> &RgbaImage {
        &self.output
    }

    fn output_width(&self) -> u32 {
        self.width
    }

    fn output_height(&self) -> u32 {
        self.height
    }

    fn load_settings(&mut self, path: &Path) -> Result<(), PatchError> {
        let mut settings = PatchSettings::load_from_file(path)?;
        settings.sanitize(self.slots);
        self.settings = settings;
        self.sync_runtimes();
        log::info!("Loaded {} settings from {:?}", self.name, path);
        Ok(())
    }

    fn save_settings(&self, path: &Path) -> Result<(), PatchError> {
        self.settings.save_to_file(path)?;
        log::info!("Saved {} settings to {:?}", self.name, path);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patches::{EffectKind, EffectSettings, InputSettings};
    use image::Rgba;

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn test_update_before_allocate_fails() {
        let mut patch = PatchManager::new("pre", 2, PatchSettings::pre_processing());
        assert!(matches!(patch.update(), Err(PatchError::NotAllocated(_))));
        assert!(matches!(
            patch.set_input_image(&solid(4, 4, 0), 0),
            Err(PatchError::NotAllocated(_))
        ));
    }

    #[test]
    fn test_slot_out_of_range() {
        let mut patch = PatchManager::new("pre", 2, PatchSettings::pre_processing());
        patch.allocate(4, 4);
        assert!(matches!(
            patch.set_input_image(&solid(4, 4, 0), 2),
            Err(PatchError::SlotOutOfRange { slot: 2, slots: 2 })
        ));
    }

    #[test]
    fn test_pre_processing_passes_depth_through() {
        let mut patch = PatchManager::new("pre", 2, PatchSettings::pre_processing());
        patch.allocate(8, 6);
        patch.set_input_image(&solid(8, 6, 10), 0).unwrap();
        patch.set_input_image(&solid(8, 6, 180), 1).unwrap();
        patch.update().unwrap();

        assert_eq!(patch.output_width(), 8);
        assert_eq!(patch.output_height(), 6);
        assert!(patch.output_image().pixels().all(|p| *p == Rgba([180, 180, 180, 255])));
    }

    #[test]
    fn test_inputs_scaled_to_allocation() {
        let mut patch = PatchManager::new("post", 2, PatchSettings::post_processing());
        patch.allocate(16, 12);
        patch.set_input_image(&solid(8, 6, 90), 1).unwrap();
        patch.update().unwrap();
        assert_eq!(patch.output_image().dimensions(), (16, 12));
        assert_eq!(*patch.output_image().get_pixel(15, 11), Rgba([90, 90, 90, 255]));
    }

    #[test]
    fn test_later_inputs_draw_on_top() {
        let mut patch = PatchManager::new("post", 2, PatchSettings::post_processing());
        patch.allocate(4, 1);

        let mut guide = RgbaImage::new(4, 1);
        guide.put_pixel(2, 0, Rgba([255, 255, 255, 255]));
        patch.set_input_image(&guide, 0).unwrap();
        patch.set_input_image(&solid(4, 1, 50), 1).unwrap();
        patch.update().unwrap();

        let out = patch.output_image();
        assert_eq!(*out.get_pixel(0, 0), Rgba([50, 50, 50, 255]));
        assert_eq!(*out.get_pixel(2, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_effect_chain_follows_settings() {
        let mut patch = PatchManager::new("pre", 2, PatchSettings::pre_processing());
        patch.allocate(2, 2);
        patch.set_input_image(&solid(2, 2, 0), 1).unwrap();

        patch.settings_mut().effects = vec![EffectSettings::new(EffectKind::Invert)];
        patch.update().unwrap();
        assert_eq!(*patch.output_image().get_pixel(0, 0), Rgba([255, 255, 255, 255]));

        patch.settings_mut().effects[0].bypassed = true;
        patch.update().unwrap();
        assert_eq!(*patch.output_image().get_pixel(0, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(patch.ticks(), 2);
    }

    #[test]
    fn test_disabled_and_missing_inputs_are_transparent() {
        let mut settings = PatchSettings::pre_processing();
        settings.inputs = vec![InputSettings {
            enabled: false,
            ..InputSettings::new(1)
        }];
        let mut patch = PatchManager::new("pre", 2, settings);
        patch.allocate(2, 2);
        patch.set_input_image(&solid(2, 2, 200), 1).unwrap();
        patch.update().unwrap();
        assert!(patch.output_image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_settings_file_round_trip() {
        let path = std::env::temp_dir().join("oakvvood_grid_patch_manager_test.xml");
        let mut patch = PatchManager::new("post", 2, PatchSettings::post_processing());
        patch.settings_mut().effects[0].bypassed = false;
        patch.save_settings(&path).unwrap();

        let loaded = PatchManager::with_settings_file("post", 2, &path, PatchSettings::default());
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.settings(), patch.settings());
    }
}
