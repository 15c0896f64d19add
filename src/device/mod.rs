//! Depth/color device abstraction
//!
//! A device delivers a color image and a depth visualization of the same size.
//! The frame loop polls it once per frame and never blocks on it.

mod camera;
mod static_device;

pub use camera::{CameraDevice, CameraInfo};
pub use static_device::StaticDevice;

use image::RgbaImage;
use thiserror::Error;

/// Lowest accepted tilt angle in degrees
pub const MIN_TILT: i32 = -30;
/// Highest accepted tilt angle in degrees
pub const MAX_TILT: i32 = 30;

/// Errors raised by depth devices
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no capture device found")]
    NoDevice,
    #[error("capture device {0} not available")]
    NotFound(u32),
    #[error("failed to start capture thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("capture device failed to open: {0}")]
    OpenFailed(String),
    #[error("capture device did not open within {0:?}")]
    OpenTimeout(std::time::Duration),
    #[error("image of {width}x{height} does not match device size {expected_width}x{expected_height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// Source of color and depth frames
pub trait DepthDevice {
    /// Start delivering frames
    fn open(&mut self) -> Result<(), DeviceError>;

    /// Stop delivering frames and release the hardware
    fn close(&mut self);

    /// Poll for a new frame without blocking
    fn update(&mut self);

    /// Whether the last `update` produced a new frame
    fn is_frame_new(&self) -> bool;

    /// Latest color image
    fn color_image(&self) -> &RgbaImage;

    /// Latest depth visualization, brighter is nearer
    fn depth_image(&self) -> &RgbaImage;

    /// Request a tilt angle, clamped to [`MIN_TILT`]..=[`MAX_TILT`]
    fn set_tilt_angle(&mut self, degrees: i32);

    /// Last applied tilt angle
    fn tilt_angle(&self) -> i32;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Human readable device name
    fn name(&self) -> &str;

    fn is_connected(&self) -> bool;
}

/// Clamp a requested tilt into the supported range
pub fn clamp_tilt(degrees: i32) -> i32 {
    degrees.clamp(MIN_TILT, MAX_TILT)
}

/// Open the first available camera, or fall back to a blank static device
pub fn open_default_device(camera_index: u32) -> Box<dyn DepthDevice> {
    let mut camera = CameraDevice::new(camera_index);
    match camera.open() {
        Ok(()) => {
            log::info!("Using capture device '{}'", camera.name());
            Box::new(camera)
        }
        Err(e) => {
            log::warn!("Depth device unavailable ({}), using blank frames", e);
            let mut blank = StaticDevice::blank();
            // Opening a static device cannot fail
            let _ = blank.open();
            Box::new(blank)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_tilt() {
        assert_eq!(clamp_tilt(0), 0);
        assert_eq!(clamp_tilt(-45), -30);
        assert_eq!(clamp_tilt(31), 30);
        assert_eq!(clamp_tilt(12), 12);
    }

    #[test]
    fn test_missing_camera_falls_back_to_blank() {
        let device = open_default_device(u32::MAX);
        assert_eq!(device.name(), "Blank");
        assert!(device.is_connected());
        assert_eq!(device.width(), 640);
        assert_eq!(device.height(), 480);
    }
}
