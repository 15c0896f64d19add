//! Depth device serving fixed images

use image::{Rgba, RgbaImage};

use super::{clamp_tilt, DepthDevice, DeviceError};
use crate::grid::{LOGICAL_HEIGHT, LOGICAL_WIDTH};

/// Device that serves fixed images
///
/// Used when no hardware is present, and by tests to drive the frame loop with
/// known depth values.
pub struct StaticDevice {
    name: String,
    color: RgbaImage,
    depth: RgbaImage,
    open: bool,
    pending: bool,
    frame_new: bool,
    tilt: i32,
}

impl StaticDevice {
    /// Device with the given color and depth images, which must share a size
    pub fn new(name: &str, color: RgbaImage, depth: RgbaImage) -> Result<Self, DeviceError> {
        check_size(&depth, color.width(), color.height())?;
        Ok(Self {
            name: name.to_string(),
            color,
            depth,
            open: false,
            pending: false,
            frame_new: false,
            tilt: 0,
        })
    }

    /// Black frames at the depth sensor resolution
    pub fn blank() -> Self {
        let black = RgbaImage::from_pixel(LOGICAL_WIDTH, LOGICAL_HEIGHT, Rgba([0, 0, 0, 255]));
        Self {
            name: "Blank".to_string(),
            color: black.clone(),
            depth: black,
            open: false,
            pending: false,
            frame_new: false,
            tilt: 0,
        }
    }

    /// Swap in new images; the next `update` reports a new frame
    pub fn replace_frame(&mut self, color: RgbaImage, depth: RgbaImage) -> Result<(), DeviceError> {
        check_size(&color, self.color.width(), self.color.height())?;
        check_size(&depth, self.color.width(), self.color.height())?;
        self.color = color;
        self.depth = depth;
        self.pending = self.open;
        Ok(())
    }
}

fn check_size(image: &RgbaImage, width: u32, height: u32) -> Result<(), DeviceError> {
    if image.width() != width || image.height() != height {
        return Err(DeviceError::SizeMismatch {
            width: image.width(),
            height: image.height(),
            expected_width: width,
            expected_height: height,
        });
    }
    Ok(())
}

impl DepthDevice for StaticDevice {
    fn open(&mut self) -> Result<(), DeviceError> {
        self.open = true;
        self.pending = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
        self.pending = false;
        self.frame_new = false;
    }

    fn update(&mut self) {
        self.frame_new = self.pending;
        self.pending = false;
    }

    fn is_frame_new(&self) -> bool {
        self.frame_new
    }

    fn color_image(&self) -> &RgbaImage {
        &self.color
    }

    fn depth_image(&self) -> &RgbaImage {
        &self.depth
    }

    fn set_tilt_angle(&mut self, degrees: i32) {
        self.tilt = clamp_tilt(degrees);
    }

    fn tilt_angle(&self) -> i32 {
        self.tilt
    }

    fn width(&self) -> u32 {
        self.color.width()
    }

    fn height(&self) -> u32 {
        self.color.height()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_device() {
        let device = StaticDevice::blank();
        assert_eq!(device.width(), 640);
        assert_eq!(device.height(), 480);
        assert!(!device.is_connected());
    }

    #[test]
    fn test_frame_new_once_after_open() {
        let mut device = StaticDevice::blank();
        device.update();
        assert!(!device.is_frame_new());

        device.open().unwrap();
        device.update();
        assert!(device.is_frame_new());
        device.update();
        assert!(!device.is_frame_new());
    }

    #[test]
    fn test_replace_frame() {
        let mut device = StaticDevice::blank();
        device.open().unwrap();
        device.update();
        device.update();

        let white = RgbaImage::from_pixel(640, 480, Rgba([255, 255, 255, 255]));
        device.replace_frame(white.clone(), white).unwrap();
        device.update();
        assert!(device.is_frame_new());
        assert_eq!(device.depth_image().get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let color = RgbaImage::new(4, 4);
        let depth = RgbaImage::new(4, 3);
        assert!(matches!(
            StaticDevice::new("test", color, depth),
            Err(DeviceError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_tilt_is_clamped() {
        let mut device = StaticDevice::blank();
        device.set_tilt_angle(90);
        assert_eq!(device.tilt_angle(), 30);
        device.set_tilt_angle(-5);
        assert_eq!(device.tilt_angle(), -5);
    }
}
