//! Depth reduction and vertex displacement
//!
//! The processed depth image is downsampled to one pixel per grid vertex, then
//! each pixel's red channel becomes that vertex's height.

mod displace;

pub use displace::{apply_displacement, height_for, DisplacementError, DISPLACEMENT_SCALE};

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::grid::GridLayout;

/// Small RGBA raster whose pixel grid matches the mesh's vertex lattice
#[derive(Debug, Clone)]
pub struct ReducedDepthBuffer {
    image: RgbaImage,
}

impl ReducedDepthBuffer {
    /// Zeroed buffer of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        (self.image.width() * self.image.height()) as usize
    }

    /// Red channel of pixel `index` in row-major order
    pub fn red(&self, index: usize) -> u8 {
        self.image.as_raw()[index * 4]
    }

    /// Raw RGBA bytes
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Downsamples the processed depth image to the vertex lattice
pub struct DepthReducer {
    layout: GridLayout,
    buffer: ReducedDepthBuffer,
}

impl DepthReducer {
    /// Reducer whose buffer is sized `(columns + 1) x (rows + 1)`
    pub fn new(layout: &GridLayout) -> Self {
        Self {
            layout: *layout,
            buffer: ReducedDepthBuffer::new(layout.lattice_width(), layout.lattice_height()),
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Resample `source` into the buffer
    ///
    /// The image is rotated 180 degrees to match the normalized render target.
    /// An empty source leaves the previous contents in place.
    pub fn reduce(&mut self, source: &RgbaImage) -> &ReducedDepthBuffer {
        if source.width() == 0 || source.height() == 0 {
            log::debug!("Skipping depth reduction of empty image");
            return &self.buffer;
        }

        let mut resized = imageops::resize(
            source,
            self.buffer.width(),
            self.buffer.height(),
            FilterType::Triangle,
        );
        imageops::rotate180_in_place(&mut resized);
        self.buffer = ReducedDepthBuffer::from_image(resized);
        &self.buffer
    }

    pub fn buffer(&self) -> &ReducedDepthBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridParams;
    use image::Rgba;

    fn layout(divisions: u32) -> GridLayout {
        GridLayout::new(GridParams::new(divisions, 1)).unwrap()
    }

    #[test]
    fn test_buffer_sized_to_lattice() {
        let reducer = DepthReducer::new(&layout(10));
        assert_eq!(reducer.buffer().width(), 65);
        assert_eq!(reducer.buffer().height(), 49);
        assert_eq!(reducer.buffer().pixel_count(), 3185);
    }

    #[test]
    fn test_rebuild_reallocates() {
        let a = DepthReducer::new(&layout(10));
        let b = DepthReducer::new(&layout(20));
        assert_eq!(a.buffer().pixel_count(), 65 * 49);
        assert_eq!(b.buffer().pixel_count(), 33 * 25);
    }

    #[test]
    fn test_uniform_image_reduces_to_same_value() {
        let mut reducer = DepthReducer::new(&layout(10));
        let source = RgbaImage::from_pixel(640, 480, Rgba([200, 200, 200, 255]));
        let buffer = reducer.reduce(&source);
        assert!((0..buffer.pixel_count()).all(|i| buffer.red(i) == 200));
    }

    #[test]
    fn test_reduction_is_flipped() {
        let mut reducer = DepthReducer::new(&layout(20));
        // Left half white, right half black
        let source = RgbaImage::from_fn(640, 480, |x, _| {
            if x < 320 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let buffer = reducer.reduce(&source);
        let width = buffer.width() as usize;
        // After the 180 degree turn the white half lands on the right
        assert_eq!(buffer.red(0), 0);
        assert_eq!(buffer.red(width - 1), 255);
    }

    #[test]
    fn test_empty_source_keeps_buffer() {
        let mut reducer = DepthReducer::new(&layout(10));
        let source = RgbaImage::new(0, 0);
        let buffer = reducer.reduce(&source);
        assert_eq!(buffer.pixel_count(), 3185);
    }
}
