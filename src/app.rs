//! Application state holding the wgpu graphics context
//!
//! Owns the frame sequencer, the renderers and the debug interface, and turns
//! window input into camera, warp and settings changes.

use std::sync::Arc;
use std::time::Instant;

use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::window::Window;

use crate::config::{
    settings_path, AppSettings, POST_PROCESSING_FILE, PRE_PROCESSING_FILE, SETTINGS_FILE,
    WARP_BLEND_FILE,
};
use crate::device::open_default_device;
use crate::patches::{EffectsPipeline, PatchManager, PatchSettings};
use crate::render::{EasyCam, SceneOptions, SceneRenderer, WarpPass, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::sequencer::{FrameParams, FrameSequencer};
use crate::ui::{
    draw_warp_points, overlay_accepts, PatchPanel, PatchTarget, SettingsPanel, StatusInfo,
    UiAction, WarpPanel,
};
use crate::warp::WarpBlendTool;

/// Input slots of each pipeline, as labelled in the editors
const PRE_SLOT_NAMES: &[&str] = &["Color", "Depth"];
const POST_SLOT_NAMES: &[&str] = &["Guides", "Depth"];

/// Orbit speed in radians per pixel
const ORBIT_SENSITIVITY: f32 = 0.005;
/// Pick radius for warp points, as a fraction of the window
const PICK_RADIUS: f32 = 0.03;

/// Background while the debug overlay is shown
const DEBUG_BACKGROUND: wgpu::Color = wgpu::Color {
    r: 100.0 / 255.0,
    g: 100.0 / 255.0,
    b: 100.0 / 255.0,
    a: 1.0,
};

/// What the left mouse button is currently dragging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragMode {
    None,
    Orbit,
    WarpPoint,
}

pub struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    // Frame pipeline
    sequencer: FrameSequencer<PatchManager>,
    settings: AppSettings,
    scene: SceneRenderer,
    warp_pass: WarpPass,
    warp: WarpBlendTool,
    camera: EasyCam,

    // Debug overlay
    debug: bool,
    settings_panel: SettingsPanel,
    pre_panel: PatchPanel,
    post_panel: PatchPanel,
    warp_panel: WarpPanel,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Mouse
    cursor_position: PhysicalPosition<f64>,
    drag: DragMode,

    // Timing
    fps: f64,
    frame_count: u64,
    frames_since_update: u32,
    last_fps_update: Instant,
}

impl App {
    pub async fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find suitable GPU adapter");

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("OakvvoodGrid Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        log::info!("Surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        // Persisted state
        let settings = AppSettings::load_or_default(&settings_path(SETTINGS_FILE));
        let pre = PatchManager::with_settings_file(
            "pre_processing",
            PRE_SLOT_NAMES.len(),
            &settings_path(PRE_PROCESSING_FILE),
            PatchSettings::pre_processing(),
        );
        let post = PatchManager::with_settings_file(
            "post_processing",
            POST_SLOT_NAMES.len(),
            &settings_path(POST_PROCESSING_FILE),
            PatchSettings::post_processing(),
        );
        let mut warp = WarpBlendTool::with_settings_file(&settings_path(WARP_BLEND_FILE));
        warp.bind(CANVAS_WIDTH, CANVAS_HEIGHT);

        let sequencer = FrameSequencer::new(open_default_device(0), pre, post);

        let scene = SceneRenderer::new(&device);
        let warp_pass = WarpPass::new(&device, surface_format, scene.canvas_view());

        // egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        // Performance mode starts with the cursor hidden
        window.set_cursor_visible(false);

        let warp_panel = WarpPanel::new(&warp);

        Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            sequencer,
            settings,
            scene,
            warp_pass,
            warp,
            camera: EasyCam::for_viewport(CANVAS_WIDTH, CANVAS_HEIGHT),
            debug: false,
            settings_panel: SettingsPanel::new(),
            pre_panel: PatchPanel::new(PatchTarget::Pre, PRE_SLOT_NAMES),
            post_panel: PatchPanel::new(PatchTarget::Post, POST_SLOT_NAMES),
            warp_panel,
            egui_ctx,
            egui_state,
            egui_renderer,
            cursor_position: PhysicalPosition::new(0.0, 0.0),
            drag: DragMode::None,
            fps: 0.0,
            frame_count: 0,
            frames_since_update: 0,
            last_fps_update: Instant::now(),
        }
    }

    /// Handle a window event, returning true if egui consumed it
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        // Hidden panels get no input, so nothing queues up between frames
        if !overlay_accepts(event, self.debug) {
            return false;
        }
        let response = self.egui_state.on_window_event(&self.window, event);
        self.debug && response.consumed
    }

    /// Resize the surface
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Show or hide the panel, cursor and grey background
    pub fn toggle_debug(&mut self) {
        self.debug = !self.debug;
        self.window.set_cursor_visible(self.debug);
        if self.debug {
            // Start the panels from a clean input queue
            let _ = self.egui_state.take_egui_input(&self.window);
        } else {
            self.drag = DragMode::None;
            self.warp.end_drag();
        }
        log::info!("Debug overlay {}", if self.debug { "shown" } else { "hidden" });
    }

    /// Warp points are editable when the warp editor is the visible one
    fn warp_editing(&self) -> bool {
        self.debug && !self.settings.edit_textures && self.settings.edit_warp_blend_tool
    }

    /// Cursor in normalized window coordinates
    fn normalized_cursor(&self) -> [f32; 2] {
        [
            self.cursor_position.x as f32 / self.size.width.max(1) as f32,
            self.cursor_position.y as f32 / self.size.height.max(1) as f32,
        ]
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button != MouseButton::Left {
            return;
        }

        match state {
            ElementState::Pressed => {
                if self.warp_editing()
                    && self.warp.begin_drag(self.normalized_cursor(), PICK_RADIUS).is_some()
                {
                    self.drag = DragMode::WarpPoint;
                } else {
                    self.drag = DragMode::Orbit;
                }
            }
            ElementState::Released => {
                self.drag = DragMode::None;
                self.warp.end_drag();
            }
        }
    }

    pub fn on_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        let dx = (position.x - self.cursor_position.x) as f32;
        let dy = (position.y - self.cursor_position.y) as f32;
        self.cursor_position = position;

        match self.drag {
            DragMode::Orbit => self.camera.on_mouse_drag((dx, dy), ORBIT_SENSITIVITY),
            DragMode::WarpPoint => {
                let [x, y] = self.normalized_cursor();
                self.warp.drag_to([x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)]);
            }
            DragMode::None => {}
        }
    }

    pub fn on_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
        };
        self.camera.on_scroll(lines);
    }

    /// Run the CPU side of the frame
    pub fn update(&mut self) {
        let params = FrameParams::from_settings(&self.settings);
        match self.sequencer.step(&params) {
            Ok(report) => {
                if report.grid_rebuilt {
                    log::debug!("Grid rebuilt on frame {}", report.frame);
                }
            }
            Err(e) => log::error!("Frame skipped: {}", e),
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // Scene into the canvas
        let mesh = self
            .sequencer
            .mesh()
            .map(|mesh| (mesh, self.sequencer.grid_generation()));
        self.scene.render(
            &mut encoder,
            &self.device,
            &self.queue,
            mesh,
            self.sequencer.normalized_image(),
            &self.camera,
            SceneOptions {
                wireframe: self.settings.draw_wireframe,
                scale: self.settings.camera_scale,
            },
        );

        // Canvas through the warp onto the surface
        let clear_color = if self.debug {
            DEBUG_BACKGROUND
        } else {
            wgpu::Color::BLACK
        };
        let blend = self.warp.blend().clone();
        let geometry = self.warp.render();
        self.warp_pass.render(
            &mut encoder,
            &self.device,
            &self.queue,
            &view,
            geometry,
            &blend,
            clear_color,
        );

        if self.debug {
            self.render_ui(&mut encoder, &view);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        self.update_fps();
        Ok(())
    }

    fn render_ui(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let raw_input = self.egui_state.take_egui_input(&self.window);

        let status = StatusInfo {
            fps: self.fps,
            device_name: self.sequencer.device().name().to_string(),
            device_connected: self.sequencer.device().is_connected(),
            frame: self.sequencer.frame_count(),
            columns: self.sequencer.layout().map_or(0, |l| l.columns()),
            rows: self.sequencer.layout().map_or(0, |l| l.rows()),
        };

        let mut actions = Vec::new();
        let ctx = self.egui_ctx.clone();
        let full_output = ctx.run(raw_input, |ctx| {
            actions.extend(self.settings_panel.show(ctx, &mut self.settings, &status));

            if self.settings.edit_textures {
                actions.extend(
                    self.pre_panel
                        .show(ctx, self.sequencer.pre_mut().settings_mut()),
                );
                actions.extend(
                    self.post_panel
                        .show(ctx, self.sequencer.post_mut().settings_mut()),
                );
            } else if self.settings.edit_warp_blend_tool {
                actions.extend(self.warp_panel.show(ctx, &mut self.warp));
                draw_warp_points(ctx, &self.warp);
            }
        });

        for action in actions {
            self.apply_action(action);
        }

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui_renderer.render(
                &mut render_pass.forget_lifetime(),
                &paint_jobs,
                &screen_descriptor,
            );
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    fn apply_action(&mut self, action: UiAction) {
        match action {
            UiAction::SaveSettings => {
                let path = settings_path(SETTINGS_FILE);
                match self.settings.save_to_file(&path) {
                    Ok(()) => log::info!("Saved settings to {:?}", path),
                    Err(e) => log::error!("Failed to save settings: {}", e),
                }
            }
            UiAction::SavePatch(target) => {
                let (pipeline, file) = match target {
                    PatchTarget::Pre => (self.sequencer.pre(), PRE_PROCESSING_FILE),
                    PatchTarget::Post => (self.sequencer.post(), POST_PROCESSING_FILE),
                };
                if let Err(e) = pipeline.save_settings(&settings_path(file)) {
                    log::error!("Failed to save {} settings: {}", target.title(), e);
                }
            }
            UiAction::SaveWarp => {
                if let Err(e) = self.warp.save_settings(&settings_path(WARP_BLEND_FILE)) {
                    log::error!("Failed to save warp calibration: {}", e);
                }
            }
            UiAction::ResetWarp => {
                self.warp.reset_warp();
            }
            UiAction::ResizeWarp(columns, rows) => {
                self.warp.mesh_mut().resize(columns, rows);
                self.warp_panel.sync(&self.warp);
            }
            UiAction::ResetCamera => {
                self.camera.reset();
            }
        }
    }

    fn update_fps(&mut self) {
        self.frame_count += 1;
        self.frames_since_update += 1;

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_fps_update = now;
        }
    }

    /// Release the device before the window goes away
    pub fn shutdown(&mut self) {
        log::info!("Shutting down after {} frames", self.frame_count);
        self.sequencer.close();
    }
}
