//! Persisted patch configuration
//!
//! Stored as XML next to the application settings, one file per pipeline.

use std::fs;
use std::path::Path;

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};

use super::{BlendMode, EffectKind, EffectParams, PatchError};

/// One composited input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSettings {
    /// Input slot this entry reads from
    pub slot: usize,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl InputSettings {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            blend: BlendMode::Normal,
            opacity: 1.0,
            enabled: true,
        }
    }
}

/// One stage of the effect chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    pub kind: EffectKind,
    #[serde(default)]
    pub bypassed: bool,
    pub amount: f32,
    pub level: f32,
}

impl EffectSettings {
    pub fn new(kind: EffectKind) -> Self {
        let params = kind.default_params();
        Self {
            kind,
            bypassed: false,
            amount: params.amount,
            level: params.level,
        }
    }

    pub fn bypassed(kind: EffectKind) -> Self {
        Self {
            bypassed: true,
            ..Self::new(kind)
        }
    }

    pub fn params(&self) -> EffectParams {
        EffectParams {
            amount: self.amount,
            level: self.level,
        }
    }
}

fn default_opacity() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Compositing order and effect chain of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "patch")]
pub struct PatchSettings {
    /// Inputs in compositing order, first is at the bottom
    #[serde(rename = "input", default)]
    pub inputs: Vec<InputSettings>,
    /// Effects applied to the composite, in order
    #[serde(rename = "effect", default)]
    pub effects: Vec<EffectSettings>,
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            inputs: vec![InputSettings::new(0)],
            effects: Vec::new(),
        }
    }
}

impl PatchSettings {
    /// Depth pass-through with optional cleanup stages
    pub fn pre_processing() -> Self {
        Self {
            inputs: vec![InputSettings::new(1)],
            effects: vec![
                EffectSettings::new(EffectKind::Levels),
                EffectSettings::bypassed(EffectKind::Blur),
                EffectSettings::bypassed(EffectKind::Threshold),
                EffectSettings::bypassed(EffectKind::Invert),
                EffectSettings::bypassed(EffectKind::Trails),
            ],
        }
    }

    /// Processed depth with the guide lines on top
    pub fn post_processing() -> Self {
        Self {
            inputs: vec![InputSettings::new(1), InputSettings::new(0)],
            effects: vec![
                EffectSettings::bypassed(EffectKind::Invert),
                EffectSettings::bypassed(EffectKind::Trails),
            ],
        }
    }

    /// Clamp parameters into range and drop inputs beyond `slots`
    pub fn sanitize(&mut self, slots: usize) {
        self.inputs.retain(|input| input.slot < slots);
        for input in &mut self.inputs {
            input.opacity = input.opacity.clamp(0.0, 1.0);
        }
        for effect in &mut self.effects {
            effect.amount = effect.amount.clamp(0.0, 1.0);
            effect.level = effect.level.clamp(0.0, 1.0);
        }
    }

    /// Load from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, PatchError> {
        let contents = fs::read_to_string(path)?;
        let settings = from_str(&contents)?;
        Ok(settings)
    }

    /// Save to an XML file, creating the parent directory if needed
    pub fn save_to_file(&self, path: &Path) -> Result<(), PatchError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let xml = to_string(self)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);
        fs::write(path, formatted)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pre = PatchSettings::pre_processing();
        assert_eq!(pre.inputs.len(), 1);
        assert_eq!(pre.inputs[0].slot, 1);
        assert!(pre.effects.iter().filter(|e| !e.bypassed).all(|e| e.kind == EffectKind::Levels));

        let post = PatchSettings::post_processing();
        let slots: Vec<usize> = post.inputs.iter().map(|i| i.slot).collect();
        assert_eq!(slots, vec![1, 0]);
    }

    #[test]
    fn test_sanitize() {
        let mut settings = PatchSettings::post_processing();
        settings.inputs.push(InputSettings::new(5));
        settings.inputs[0].opacity = 3.0;
        settings.effects[0].amount = -1.0;
        settings.sanitize(2);

        assert_eq!(settings.inputs.len(), 2);
        assert_eq!(settings.inputs[0].opacity, 1.0);
        assert_eq!(settings.effects[0].amount, 0.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("oakvvood_grid_patch_settings_test.xml");
        let mut settings = PatchSettings::pre_processing();
        settings.inputs[0].blend = BlendMode::Screen;
        settings.inputs[0].opacity = 0.25;
        settings.effects[1].bypassed = false;
        settings.effects[1].amount = 0.5;

        settings.save_to_file(&path).unwrap();
        let loaded = PatchSettings::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("oakvvood_grid_no_such_patch.xml");
        assert!(matches!(
            PatchSettings::load_from_file(&path),
            Err(PatchError::Io(_))
        ));
    }
}
