//! Per-frame orchestration
//!
//! `FrameSequencer::step` runs the whole CPU side of a frame in a fixed
//! order: reconcile parameters, poll the device, advance both effects
//! pipelines, fill the normalized image, reduce depth and displace the mesh.
//! The renderer then draws whatever the sequencer holds.

use image::imageops;
use image::RgbaImage;
use thiserror::Error;

use crate::config::AppSettings;
use crate::depth::{apply_displacement, DepthReducer, DisplacementError, ReducedDepthBuffer};
use crate::device::DepthDevice;
use crate::grid::{render_guide_lines, GridError, GridLayout, GridMesh, GridParams};
use crate::patches::{EffectsPipeline, PatchError};

/// Pre-stage slot receiving the device color image
pub const PRE_COLOR_SLOT: usize = 0;
/// Pre-stage slot receiving the device depth image
pub const PRE_DEPTH_SLOT: usize = 1;
/// Post-stage slot receiving the guide lines
pub const POST_GUIDE_SLOT: usize = 0;
/// Post-stage slot receiving the pre-stage output
pub const POST_DEPTH_SLOT: usize = 1;

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Displacement(#[from] DisplacementError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Parameters resolved once per frame from the settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParams {
    pub grid: GridParams,
    pub tilt: i32,
}

impl FrameParams {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            grid: settings.grid_params(),
            tilt: settings.kinect_angle,
        }
    }
}

/// What happened during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub new_device_frame: bool,
    pub grid_rebuilt: bool,
}

/// Everything that is rebuilt together when the grid parameters change
struct GridState {
    params: GridParams,
    layout: GridLayout,
    mesh: GridMesh,
    guide: RgbaImage,
    reducer: DepthReducer,
}

impl GridState {
    fn build(params: GridParams) -> Result<Self, GridError> {
        let layout = GridLayout::new(params)?;
        Ok(Self {
            params,
            layout,
            mesh: GridMesh::plane(layout),
            guide: render_guide_lines(&layout, params.thickness),
            reducer: DepthReducer::new(&layout),
        })
    }
}

/// Drives device, pipelines and grid once per frame
pub struct FrameSequencer<P: EffectsPipeline> {
    device: Box<dyn DepthDevice>,
    pre: P,
    post: P,
    grid: Option<GridState>,
    normalized: RgbaImage,
    applied_tilt: Option<i32>,
    frame: u64,
    grid_generation: u64,
}

impl<P: EffectsPipeline> FrameSequencer<P> {
    /// Allocate the pre-stage at device size and the post-stage at twice that
    pub fn new(device: Box<dyn DepthDevice>, mut pre: P, mut post: P) -> Self {
        let (width, height) = (device.width(), device.height());
        pre.allocate(width, height);
        post.allocate(width * 2, height * 2);

        Self {
            device,
            pre,
            post,
            grid: None,
            normalized: RgbaImage::new(width * 2, height * 2),
            applied_tilt: None,
            frame: 0,
            grid_generation: 0,
        }
    }

    /// Run one frame
    ///
    /// A grid parameter error leaves the previous grid in place.
    pub fn step(&mut self, params: &FrameParams) -> Result<FrameReport, SequencerError> {
        let grid_rebuilt = self.reconcile(params)?;

        self.device.update();
        let new_device_frame = self.device.is_frame_new();
        if new_device_frame {
            self.pre
                .set_input_image(self.device.color_image(), PRE_COLOR_SLOT)?;
            self.pre
                .set_input_image(self.device.depth_image(), PRE_DEPTH_SLOT)?;
        }

        self.pre.update()?;

        self.post
            .set_input_image(self.pre.output_image(), POST_DEPTH_SLOT)?;
        self.post.update()?;

        self.normalized = imageops::rotate180(self.post.output_image());

        if let Some(grid) = self.grid.as_mut() {
            let reduced = grid.reducer.reduce(self.pre.output_image());
            apply_displacement(&mut grid.mesh, reduced)?;
        }

        self.frame += 1;
        Ok(FrameReport {
            frame: self.frame,
            new_device_frame,
            grid_rebuilt,
        })
    }

    /// Apply parameter changes; returns whether the grid was rebuilt
    fn reconcile(&mut self, params: &FrameParams) -> Result<bool, SequencerError> {
        if self.applied_tilt != Some(params.tilt) {
            self.device.set_tilt_angle(params.tilt);
            self.applied_tilt = Some(params.tilt);
        }

        if self.grid.as_ref().map(|g| g.params) == Some(params.grid) {
            return Ok(false);
        }

        let grid = GridState::build(params.grid)?;
        log::info!(
            "Grid rebuilt: {}x{} cells, {} vertices, thickness {}",
            grid.layout.columns(),
            grid.layout.rows(),
            grid.mesh.vertex_count(),
            params.grid.thickness
        );

        self.post.set_input_image(&grid.guide, POST_GUIDE_SLOT)?;
        self.normalized = RgbaImage::new(self.post.output_width(), self.post.output_height());
        self.grid = Some(grid);
        self.grid_generation += 1;
        Ok(true)
    }

    pub fn mesh(&self) -> Option<&GridMesh> {
        self.grid.as_ref().map(|g| &g.mesh)
    }

    pub fn layout(&self) -> Option<&GridLayout> {
        self.grid.as_ref().map(|g| &g.layout)
    }

    pub fn guide_image(&self) -> Option<&RgbaImage> {
        self.grid.as_ref().map(|g| &g.guide)
    }

    pub fn reduced_buffer(&self) -> Option<&ReducedDepthBuffer> {
        self.grid.as_ref().map(|g| g.reducer.buffer())
    }

    /// Post-stage output turned 180 degrees, the texture applied to the mesh
    pub fn normalized_image(&self) -> &RgbaImage {
        &self.normalized
    }

    /// Incremented on every grid rebuild
    pub fn grid_generation(&self) -> u64 {
        self.grid_generation
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn device(&self) -> &dyn DepthDevice {
        self.device.as_ref()
    }

    pub fn pre(&self) -> &P {
        &self.pre
    }

    pub fn pre_mut(&mut self) -> &mut P {
        &mut self.pre
    }

    pub fn post(&self) -> &P {
        &self.post
    }

    pub fn post_mut(&mut self) -> &mut P {
        &mut self.post
    }

    /// Release the device
    pub fn close(&mut self) {
        self.device.close();
    }
}
