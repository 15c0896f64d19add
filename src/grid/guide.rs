//! Guide-line overlay
//!
//! White lines on transparent at the interior cell boundaries. The boundary
//! lines at index 0 and at the last column/row are never drawn.

use image::{Rgba, RgbaImage};

use super::{GridLayout, LOGICAL_HEIGHT, LOGICAL_WIDTH};

/// Guide image width, twice the depth resolution
pub const GUIDE_WIDTH: u32 = LOGICAL_WIDTH * 2;
/// Guide image height, twice the depth resolution
pub const GUIDE_HEIGHT: u32 = LOGICAL_HEIGHT * 2;

const LINE_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Line centre positions in image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct GuideLines {
    pub vertical: Vec<f32>,
    pub horizontal: Vec<f32>,
}

/// Interior line positions for an image of `width x height`
///
/// Spacing is `width / (columns - 1)` and `height / (rows - 1)`, with lines at
/// indices `1..columns-1` and `1..rows-1`.
pub fn guide_line_positions(layout: &GridLayout, width: u32, height: u32) -> GuideLines {
    let columns = layout.columns();
    let rows = layout.rows();
    let x_gap = width as f32 / (columns - 1) as f32;
    let y_gap = height as f32 / (rows - 1) as f32;

    GuideLines {
        vertical: (1..columns - 1).map(|x| x as f32 * x_gap).collect(),
        horizontal: (1..rows - 1).map(|y| y as f32 * y_gap).collect(),
    }
}

/// Rasterize the guide lines at [`GUIDE_WIDTH`] x [`GUIDE_HEIGHT`]
pub fn render_guide_lines(layout: &GridLayout, thickness: u32) -> RgbaImage {
    render_guide_lines_sized(layout, thickness, GUIDE_WIDTH, GUIDE_HEIGHT)
}

pub(crate) fn render_guide_lines_sized(
    layout: &GridLayout,
    thickness: u32,
    width: u32,
    height: u32,
) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    let lines = guide_line_positions(layout, width, height);
    let thickness = thickness.max(1);

    for &x in &lines.vertical {
        for px in span(x, thickness, width) {
            for py in 0..height {
                image.put_pixel(px, py, LINE_COLOR);
            }
        }
    }

    for &y in &lines.horizontal {
        for py in span(y, thickness, height) {
            for px in 0..width {
                image.put_pixel(px, py, LINE_COLOR);
            }
        }
    }

    image
}

/// Pixel range of a `thickness`-wide line centred on `center`, clipped to `limit`
fn span(center: f32, thickness: u32, limit: u32) -> std::ops::Range<u32> {
    let start = (center - thickness as f32 / 2.0).round().max(0.0) as u32;
    let end = (start + thickness).min(limit);
    start.min(limit)..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridParams, MAX_DIVISIONS, MIN_DIVISIONS};

    fn layout(divisions: u32) -> GridLayout {
        GridLayout::new(GridParams::new(divisions, 1)).unwrap()
    }

    fn count_runs(pixels: impl Iterator<Item = Rgba<u8>>) -> usize {
        let mut runs = 0;
        let mut inside = false;
        for p in pixels {
            let lit = p[3] > 0;
            if lit && !inside {
                runs += 1;
            }
            inside = lit;
        }
        runs
    }

    #[test]
    fn test_line_counts() {
        for divisions in MIN_DIVISIONS..=MAX_DIVISIONS {
            let layout = layout(divisions);
            let lines = guide_line_positions(&layout, GUIDE_WIDTH, GUIDE_HEIGHT);
            assert_eq!(lines.vertical.len(), (layout.columns() - 2) as usize);
            assert_eq!(lines.horizontal.len(), (layout.rows() - 2) as usize);
        }
    }

    #[test]
    fn test_rasterized_lines_exclude_boundaries() {
        for divisions in [3, 10, 20] {
            let layout = layout(divisions);
            let image = render_guide_lines(&layout, 1);
            assert_eq!(image.dimensions(), (1280, 960));

            // Row 0 and column 0 are boundaries, so only the crossing lines show
            let vertical = count_runs((0..GUIDE_WIDTH).map(|x| *image.get_pixel(x, 0)));
            let horizontal = count_runs((0..GUIDE_HEIGHT).map(|y| *image.get_pixel(0, y)));
            assert_eq!(vertical, (layout.columns() - 2) as usize);
            assert_eq!(horizontal, (layout.rows() - 2) as usize);

            assert_eq!(image.get_pixel(GUIDE_WIDTH - 1, 0)[3], 0);
            assert_eq!(image.get_pixel(0, GUIDE_HEIGHT - 1)[3], 0);
        }
    }

    #[test]
    fn test_thickness() {
        let layout = layout(20); // 32 columns, gap ~41px
        let image = render_guide_lines(&layout, 5);
        let lit = (0..GUIDE_WIDTH)
            .filter(|&x| image.get_pixel(x, 0)[3] > 0)
            .count();
        assert_eq!(lit, 30 * 5);
    }

    #[test]
    fn test_lines_are_white() {
        let image = render_guide_lines(&layout(10), 3);
        assert!(image
            .pixels()
            .all(|p| p[3] == 0 || *p == Rgba([255, 255, 255, 255])));
    }
}
