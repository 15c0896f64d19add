//! Image effects pipelines
//!
//! A pipeline takes a fixed number of input images, composites them and runs
//! the result through an effect chain. The frame loop drives two of them: the
//! pre-processing stage cleans up the depth image, the post-processing stage
//! lays the guide lines over it before it is textured onto the grid.

mod blend;
mod effects;
mod manager;
mod settings;

pub use blend::BlendMode;
pub use effects::{EffectKind, EffectParams, PatchEffect};
pub use manager::PatchManager;
pub use settings::{EffectSettings, InputSettings, PatchSettings};

use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

/// Errors raised by effects pipelines
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
    #[error("input slot {slot} out of range, pipeline has {slots} slots")]
    SlotOutOfRange { slot: usize, slots: usize },
    #[error("pipeline '{0}' used before allocate")]
    NotAllocated(String),
}

/// Interface the frame loop uses to drive an effects pipeline
pub trait EffectsPipeline {
    /// Size the working buffers; inputs are scaled to this size
    fn allocate(&mut self, width: u32, height: u32);

    /// Replace the image held in `slot`
    fn set_input_image(&mut self, image: &RgbaImage, slot: usize) -> Result<(), PatchError>;

    /// Advance one tick: composite inputs and run the effect chain
    fn update(&mut self) -> Result<(), PatchError>;

    /// Result of the last `update`
    fn output_image(&self) -> &RgbaImage;

    fn output_width(&self) -> u32;

    fn output_height(&self) -> u32;

    /// Replace the configuration with the contents of `path`
    fn load_settings(&mut self, path: &Path) -> Result<(), PatchError>;

    /// Write the configuration to `path`
    fn save_settings(&self, path: &Path) -> Result<(), PatchError>;

    /// Pipeline name used in logs and the editor
    fn name(&self) -> &str;
}
