//! Application settings
//!
//! The values edited in the settings panel, persisted to `settings.xml`.
//! Element names follow the panel labels.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{MAX_TILT, MIN_TILT};
use crate::grid::{GridParams, MAX_DIVISIONS, MAX_THICKNESS, MIN_DIVISIONS, MIN_THICKNESS};

/// Directory name under the platform config directory
pub const APP_DIR_NAME: &str = "OakvvoodGrid";
pub const SETTINGS_FILE: &str = "settings.xml";
pub const PRE_PROCESSING_FILE: &str = "pre_processing.xml";
pub const POST_PROCESSING_FILE: &str = "post_processing.xml";
pub const WARP_BLEND_FILE: &str = "warp_blend.xml";

pub const MIN_CAMERA_SCALE: f32 = 0.5;
pub const MAX_CAMERA_SCALE: f32 = 5.0;

/// Settings-related errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}

/// Values edited in the settings panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Settings", default)]
pub struct AppSettings {
    /// Depth sensor tilt in degrees
    #[serde(rename = "Kinect_Angle")]
    pub kinect_angle: i32,

    /// Logical pixels per grid cell
    #[serde(rename = "Grid_Divisions")]
    pub grid_divisions: u32,

    /// Guide line thickness in pixels
    #[serde(rename = "Grid_Thickness")]
    pub grid_thickness: u32,

    /// Uniform scale applied to the mesh before projection
    #[serde(rename = "Camera_Scale")]
    pub camera_scale: f32,

    #[serde(rename = "Draw_Wireframe")]
    pub draw_wireframe: bool,

    /// Show the effects pipeline editors in debug mode
    #[serde(rename = "Edit_Textures")]
    pub edit_textures: bool,

    /// Show the warp/blend editor in debug mode
    #[serde(rename = "Edit_Warp_Blend_Tool")]
    pub edit_warp_blend_tool: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            kinect_angle: 0,
            grid_divisions: 10,
            grid_thickness: 1,
            camera_scale: 1.0,
            draw_wireframe: false,
            edit_textures: false,
            edit_warp_blend_tool: false,
        }
    }
}

impl AppSettings {
    /// Clamp every value into its declared range
    pub fn clamp(&mut self) {
        self.kinect_angle = self.kinect_angle.clamp(MIN_TILT, MAX_TILT);
        self.grid_divisions = self.grid_divisions.clamp(MIN_DIVISIONS, MAX_DIVISIONS);
        self.grid_thickness = self.grid_thickness.clamp(MIN_THICKNESS, MAX_THICKNESS);
        self.camera_scale = if self.camera_scale.is_finite() {
            self.camera_scale.clamp(MIN_CAMERA_SCALE, MAX_CAMERA_SCALE)
        } else {
            1.0
        };
    }

    pub fn grid_params(&self) -> GridParams {
        GridParams::new(self.grid_divisions, self.grid_thickness)
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Self = from_str(&contents)?;
        settings.clamp();
        Ok(settings)
    }

    /// Load settings, falling back to defaults with a warning
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No settings at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                log::warn!("Failed to load settings from {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save settings to an XML file, creating the parent directory if needed
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
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

/// Directory holding all persisted files
///
/// The platform config directory when available, otherwise the working directory.
pub fn settings_dir() -> PathBuf {
    match dirs::config_dir() {
        Some(mut dir) => {
            dir.push(APP_DIR_NAME);
            dir
        }
        None => PathBuf::from("."),
    }
}

/// Full path of a persisted file
pub fn settings_path(file_name: &str) -> PathBuf {
    settings_dir().join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.kinect_angle, 0);
        assert_eq!(settings.grid_divisions, 10);
        assert_eq!(settings.grid_thickness, 1);
        assert_eq!(settings.camera_scale, 1.0);
        assert!(!settings.draw_wireframe);
        assert!(!settings.edit_textures);
        assert!(!settings.edit_warp_blend_tool);
    }

    #[test]
    fn test_clamping() {
        let mut settings = AppSettings {
            kinect_angle: 45,
            grid_divisions: 1,
            grid_thickness: 50,
            camera_scale: 9.0,
            ..AppSettings::default()
        };
        settings.clamp();
        assert_eq!(settings.kinect_angle, 30);
        assert_eq!(settings.grid_divisions, 3);
        assert_eq!(settings.grid_thickness, 10);
        assert_eq!(settings.camera_scale, 5.0);

        settings.camera_scale = f32::NAN;
        settings.clamp();
        assert_eq!(settings.camera_scale, 1.0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("oakvvood_grid_settings_test.xml");
        let settings = AppSettings {
            kinect_angle: -12,
            grid_divisions: 16,
            grid_thickness: 3,
            camera_scale: 2.5,
            draw_wireframe: true,
            edit_textures: false,
            edit_warp_blend_tool: true,
        };
        settings.save_to_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("<?xml"));
        assert!(contents.contains("<Grid_Divisions>16</Grid_Divisions>"));

        let loaded = AppSettings::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_out_of_range_file_is_clamped() {
        let path = std::env::temp_dir().join("oakvvood_grid_settings_clamp_test.xml");
        std::fs::write(
            &path,
            "<Settings><Kinect_Angle>-90</Kinect_Angle><Grid_Divisions>40</Grid_Divisions></Settings>",
        )
        .unwrap();

        let loaded = AppSettings::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.kinect_angle, -30);
        assert_eq!(loaded.grid_divisions, 20);
        assert_eq!(loaded.grid_thickness, 1);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("oakvvood_grid_no_such_settings.xml");
        assert_eq!(AppSettings::load_or_default(&path), AppSettings::default());
    }

    #[test]
    fn test_settings_path() {
        let path = settings_path(SETTINGS_FILE);
        assert!(path.ends_with(SETTINGS_FILE));
    }
}
