//! Grid scene renderer
//!
//! Draws the displaced grid, textured with the normalized image or as a
//! wireframe, through the orbit camera into the offscreen canvas.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::camera::EasyCam;
use super::{CANVAS_FORMAT, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::grid::{GridMesh, GridVertex};

/// Scene uniform buffer data
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SceneUniforms {
    mvp: [[f32; 4]; 4],
    wire_color: [f32; 4],
}

/// How the mesh is drawn this frame
#[derive(Debug, Clone, Copy)]
pub struct SceneOptions {
    pub wireframe: bool,
    /// Uniform model scale
    pub scale: f32,
}

/// Mesh buffers for one grid generation
struct MeshBuffers {
    generation: u64,
    vertex_buffer: wgpu::Buffer,
    triangle_buffer: wgpu::Buffer,
    triangle_count: u32,
    line_buffer: wgpu::Buffer,
    line_count: u32,
}

pub struct SceneRenderer {
    textured_pipeline: wgpu::RenderPipeline,
    wireframe_pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    mesh: Option<MeshBuffers>,

    // Normalized image uploaded each frame
    image_texture: Option<wgpu::Texture>,
    image_view: Option<wgpu::TextureView>,
    image_size: (u32, u32),

    // Canvas the warp pass reads from
    canvas_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl SceneRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/grid.wgsl").into()),
        });

        // [0] scene uniforms, [1] normalized image, [2] sampler
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grid Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let textured_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "fs_textured",
            wgpu::PrimitiveTopology::TriangleList,
            "Grid Textured Pipeline",
        );
        let wireframe_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "fs_wireframe",
            wgpu::PrimitiveTopology::LineList,
            "Grid Wireframe Pipeline",
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Uniform Buffer"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Grid Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let canvas_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Canvas Texture"),
            size: wgpu::Extent3d {
                width: CANVAS_WIDTH,
                height: CANVAS_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CANVAS_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Canvas Depth Texture"),
            size: wgpu::Extent3d {
                width: CANVAS_WIDTH,
                height: CANVAS_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            textured_pipeline,
            wireframe_pipeline,
            bind_group_layout,
            uniform_buffer,
            sampler,
            mesh: None,
            image_texture: None,
            image_view: None,
            image_size: (0, 0),
            canvas_view: canvas_texture.create_view(&Default::default()),
            depth_view: depth_texture.create_view(&Default::default()),
        }
    }

    /// View of the rendered canvas
    pub fn canvas_view(&self) -> &wgpu::TextureView {
        &self.canvas_view
    }

    /// Recreate mesh buffers on a new grid generation, otherwise refresh heights
    fn update_mesh(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, mesh: &GridMesh, generation: u64) {
        match &self.mesh {
            Some(buffers) if buffers.generation == generation => {
                queue.write_buffer(&buffers.vertex_buffer, 0, bytemuck::cast_slice(mesh.vertices()));
            }
            _ => {
                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Vertex Buffer"),
                    contents: bytemuck::cast_slice(mesh.vertices()),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                });
                let triangle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Triangle Index Buffer"),
                    contents: bytemuck::cast_slice(mesh.triangle_indices()),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let line_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Grid Line Index Buffer"),
                    contents: bytemuck::cast_slice(mesh.line_indices()),
                    usage: wgpu::BufferUsages::INDEX,
                });

                log::debug!("Grid buffers recreated for generation {}", generation);
                self.mesh = Some(MeshBuffers {
                    generation,
                    vertex_buffer,
                    triangle_buffer,
                    triangle_count: mesh.triangle_indices().len() as u32,
                    line_buffer,
                    line_count: mesh.line_indices().len() as u32,
                });
            }
        }
    }

    /// Upload the normalized image, recreating the texture when its size changes
    fn update_image(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        if self.image_size != (width, height) || self.image_texture.is_none() {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Normalized Image Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            self.image_view = Some(texture.create_view(&Default::default()));
            self.image_texture = Some(texture);
            self.image_size = (width, height);
        }

        if let Some(texture) = &self.image_texture {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    /// Render the mesh into the canvas
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        mesh: Option<(&GridMesh, u64)>,
        image: &RgbaImage,
        camera: &EasyCam,
        options: SceneOptions,
    ) {
        if let Some((mesh, generation)) = mesh {
            self.update_mesh(device, queue, mesh, generation);
        }
        self.update_image(device, queue, image);

        let model = Mat4::from_scale(Vec3::splat(options.scale));
        let uniforms = SceneUniforms {
            mvp: (camera.view_projection_matrix() * model).to_cols_array_2d(),
            wire_color: [1.0, 1.0, 1.0, 1.0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Grid Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.canvas_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (Some(buffers), Some(image_view)) = (&self.mesh, &self.image_view) else {
            return;
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grid Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(image_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.set_vertex_buffer(0, buffers.vertex_buffer.slice(..));
        if options.wireframe {
            render_pass.set_pipeline(&self.wireframe_pipeline);
            render_pass.set_index_buffer(buffers.line_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..buffers.line_count, 0, 0..1);
        } else {
            render_pass.set_pipeline(&self.textured_pipeline);
            render_pass.set_index_buffer(buffers.triangle_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..buffers.triangle_count, 0, 0..1);
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
    topology: wgpu::PrimitiveTopology,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[GridVertex::buffer_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: CANVAS_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // The grid is seen from both sides while orbiting
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
