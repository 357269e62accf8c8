//! Surface caustic pass: projects the normal field into caustic intensity.
//!
//! A grid spanning the surface is displaced in the vertex shader along the
//! refracted light ray and rasterized additively; the fragment shader turns
//! the area change of each triangle into brightness.

use std::sync::Arc;

use liquid::{BodyConfig, CausticCamera, LiquidParams};

use super::mesh::{CausticGridMesh, CausticVertex};
use super::slot::{self, PassSlot};
use crate::gpu::params::CausticUniforms;
use crate::gpu::GpuError;

const PASS: &str = "Surface Caustic Pass";
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Clone, Debug)]
pub struct CausticPassConfig {
    /// Simulation resolution
    pub width: u32,
    pub height: u32,
    /// Target resolution multiplier
    pub output_scale: u32,
    /// Grid cells along X and Y; (1, 1) is a single quad
    pub grid_cells: (u32, u32),
    pub near_clip_z: f32,
    pub far_clip_z: f32,
    pub debug_target: Option<Arc<wgpu::Texture>>,
}

impl CausticPassConfig {
    pub fn from_body(body: &BodyConfig) -> Self {
        Self {
            width: body.liquid.depth_texture_width,
            height: body.liquid.depth_texture_height,
            output_scale: body.caustic.output_scale,
            grid_cells: body.caustic_grid_cells(),
            near_clip_z: body.caustic.near_clip_z,
            far_clip_z: body.caustic.far_clip_z,
            debug_target: None,
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        (
            self.width.saturating_mul(self.output_scale),
            self.height.saturating_mul(self.output_scale),
        )
    }
}

struct CausticResources {
    output_width: u32,
    output_height: u32,
    camera: CausticCamera,
    mesh: CausticGridMesh,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    output: Arc<wgpu::Texture>,
    output_view: wgpu::TextureView,
    debug_target: Option<Arc<wgpu::Texture>>,
}

pub struct SurfaceCausticPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    slot: PassSlot<CausticResources>,
    allocations: u32,
}

impl SurfaceCausticPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Surface Caustic Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/surface_caustic.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Caustic Layout"),
            entries: &[
                slot::uniform_entry(0, wgpu::ShaderStages::VERTEX),
                slot::texture_entry(1, wgpu::ShaderStages::VERTEX, true), // normals
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Surface Caustic Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Surface Caustic Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[CausticVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FORMAT,
                    blend: Some(wgpu::BlendState {
                        color: additive,
                        alpha: additive,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Refraction can fold triangles over
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
            slot: PassSlot::Unconfigured,
            allocations: 0,
        }
    }

    pub fn init_pass(&mut self, device: &wgpu::Device, config: CausticPassConfig) {
        let attempted = self.slot.init_with(device, PASS, || {
            if config.output_scale == 0 {
                return Err(GpuError::InvalidConfig("caustic output scale must be >= 1".into()));
            }
            let (output_width, output_height) = config.output_size();
            slot::check_resolution(device, output_width, output_height)?;

            let (cells_x, cells_y) = config.grid_cells;
            let mesh = CausticGridMesh::new(device, cells_x, cells_y);

            let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Surface Caustic Uniforms"),
                size: std::mem::size_of::<CausticUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Surface Caustic Normal Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });

            let output = Arc::new(slot::create_texture(
                device,
                "Surface Caustic Output",
                output_width,
                output_height,
                FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ));

            let debug_target =
                slot::accept_debug_target(PASS, config.debug_target.clone(), output_width, output_height, FORMAT);

            log::info!(
                "{PASS}: {}x{} target, {}x{} grid cells",
                output_width,
                output_height,
                cells_x.max(1),
                cells_y.max(1)
            );

            Ok(CausticResources {
                output_width,
                output_height,
                camera: CausticCamera::new(config.near_clip_z, config.far_clip_z),
                mesh,
                uniform_buffer,
                sampler,
                output_view: output.create_view(&Default::default()),
                output,
                debug_target,
            })
        });
        if attempted {
            self.allocations += 1;
        }
    }

    pub fn is_valid_pass(&self) -> bool {
        self.slot.is_ready()
    }

    pub fn slot_failure(&self) -> Option<&str> {
        self.slot.failure()
    }

    pub fn allocation_count(&self) -> u32 {
        self.allocations
    }

    pub fn output_view(&self) -> Option<&wgpu::TextureView> {
        self.slot.resources().map(|r| &r.output_view)
    }

    pub fn output_texture(&self) -> Option<&Arc<wgpu::Texture>> {
        self.slot.resources().map(|r| &r.output)
    }

    pub fn output_size(&self) -> Option<(u32, u32)> {
        self.slot.resources().map(|r| (r.output_width, r.output_height))
    }

    /// Clear the target and rasterize the displaced grid into it.
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: &LiquidParams,
        normal_view: &wgpu::TextureView,
    ) {
        let Some(res) = self.slot.resources() else {
            log::trace!("{PASS}: render skipped, pass not ready");
            return;
        };

        let uniforms = CausticUniforms::new(res.camera.view_proj(), params.refraction.max(0.0));
        queue.write_buffer(&res.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Caustic Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: res.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&res.sampler),
                },
            ],
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Surface Caustic Projection"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &res.output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, res.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(res.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..res.mesh.num_indices, 0, 0..1);
        }

        if let Some(target) = &res.debug_target {
            slot::copy_texture(encoder, &res.output, target);
        }
    }
}
