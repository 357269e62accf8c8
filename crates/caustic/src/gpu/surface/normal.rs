//! Surface normal pass: central-difference normals from the height field.

use std::sync::Arc;

use liquid::BodyConfig;

use super::slot::{self, PassSlot};
use crate::gpu::params::NormalParams;

const PASS: &str = "Surface Normal Pass";
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Clone, Debug)]
pub struct NormalPassConfig {
    pub width: u32,
    pub height: u32,
    /// World-space distance between neighbouring height samples
    pub texel_world_size: f32,
    pub debug_target: Option<Arc<wgpu::Texture>>,
}

impl NormalPassConfig {
    pub fn from_body(body: &BodyConfig) -> Self {
        Self {
            width: body.liquid.depth_texture_width,
            height: body.liquid.depth_texture_height,
            texel_world_size: body.texel_world_size(),
            debug_target: None,
        }
    }
}

struct NormalResources {
    width: u32,
    height: u32,
    output: Arc<wgpu::Texture>,
    output_view: wgpu::TextureView,
    params_buffer: wgpu::Buffer,
    debug_target: Option<Arc<wgpu::Texture>>,
}

pub struct SurfaceNormalPass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    slot: PassSlot<NormalResources>,
    allocations: u32,
}

impl SurfaceNormalPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Surface Normal Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/surface_normal.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Normal Layout"),
            entries: &[
                slot::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                slot::texture_entry(1, wgpu::ShaderStages::COMPUTE, false), // height
                slot::storage_texture_entry(2, FORMAT),                     // normals
            ],
        });

        let pipeline =
            slot::create_compute_pipeline(device, "Surface Normal Pipeline", &shader, &bind_group_layout, "compute_normals");

        Self {
            pipeline,
            bind_group_layout,
            slot: PassSlot::Unconfigured,
            allocations: 0,
        }
    }

    pub fn init_pass(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, config: NormalPassConfig) {
        let attempted = self.slot.init_with(device, PASS, || {
            slot::check_resolution(device, config.width, config.height)?;

            let output = Arc::new(slot::create_texture(
                device,
                "Surface Normal Output",
                config.width,
                config.height,
                FORMAT,
                wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ));

            // Texel size is fixed for the life of the pass
            let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Surface Normal Params"),
                size: std::mem::size_of::<NormalParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let uniforms = NormalParams::new(config.texel_world_size, config.width, config.height);
            queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&uniforms));

            let debug_target =
                slot::accept_debug_target(PASS, config.debug_target.clone(), config.width, config.height, FORMAT);

            Ok(NormalResources {
                width: config.width,
                height: config.height,
                output_view: output.create_view(&Default::default()),
                output,
                params_buffer,
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

    pub fn render(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, height_view: &wgpu::TextureView) {
        let Some(res) = self.slot.resources() else {
            log::trace!("{PASS}: render skipped, pass not ready");
            return;
        };

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Normal Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: res.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(height_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&res.output_view),
                },
            ],
        });

        slot::dispatch_2d(encoder, "Surface Normal Compute", &self.pipeline, &bind_group, res.width, res.height);

        if let Some(target) = &res.debug_target {
            slot::copy_texture(encoder, &res.output, target);
        }
    }
}
