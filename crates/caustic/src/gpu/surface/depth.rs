//! Surface depth pass: captured depth -> bounded penetration depth.

use std::sync::Arc;

use liquid::{BodyConfig, LiquidParams};

use super::slot::{self, PassSlot};
use crate::gpu::params::DepthParams;

const PASS: &str = "Surface Depth Pass";
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

#[derive(Clone, Debug)]
pub struct DepthPassConfig {
    pub width: u32,
    pub height: u32,
    pub min_depth: f32,
    pub max_depth: f32,
    pub debug_target: Option<Arc<wgpu::Texture>>,
}

impl DepthPassConfig {
    pub fn from_body(body: &BodyConfig) -> Self {
        Self {
            width: body.liquid.depth_texture_width,
            height: body.liquid.depth_texture_height,
            min_depth: 0.0,
            max_depth: body.body_depth,
            debug_target: None,
        }
    }
}

struct DepthResources {
    width: u32,
    height: u32,
    min_depth: f32,
    max_depth: f32,
    input: wgpu::Texture,
    output: Arc<wgpu::Texture>,
    output_view: wgpu::TextureView,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    debug_target: Option<Arc<wgpu::Texture>>,
}

/// Normalizes an external depth capture into the forcing field.
pub struct SurfaceDepthPass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    slot: PassSlot<DepthResources>,
    allocations: u32,
}

impl SurfaceDepthPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Surface Depth Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/surface_depth.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Depth Layout"),
            entries: &[
                slot::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                slot::texture_entry(1, wgpu::ShaderStages::COMPUTE, false), // captured depth
                slot::storage_texture_entry(2, FORMAT),                     // penetration
            ],
        });

        let pipeline =
            slot::create_compute_pipeline(device, "Surface Depth Pipeline", &shader, &bind_group_layout, "normalize_depth");

        Self {
            pipeline,
            bind_group_layout,
            slot: PassSlot::Unconfigured,
            allocations: 0,
        }
    }

    /// Allocate the input copy, output texture and bindings. No-op after the
    /// first call.
    pub fn init_pass(&mut self, device: &wgpu::Device, config: DepthPassConfig) {
        let layout = &self.bind_group_layout;
        let attempted = self.slot.init_with(device, PASS, || {
            slot::check_resolution(device, config.width, config.height)?;

            let input = slot::create_texture(
                device,
                "Surface Depth Input",
                config.width,
                config.height,
                FORMAT,
                wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            );
            let output = Arc::new(slot::create_texture(
                device,
                "Surface Depth Output",
                config.width,
                config.height,
                FORMAT,
                wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ));
            let input_view = input.create_view(&Default::default());
            let output_view = output.create_view(&Default::default());

            let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Surface Depth Params"),
                size: std::mem::size_of::<DepthParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Surface Depth Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&input_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&output_view),
                    },
                ],
            });

            let debug_target =
                slot::accept_debug_target(PASS, config.debug_target.clone(), config.width, config.height, FORMAT);

            Ok(DepthResources {
                width: config.width,
                height: config.height,
                min_depth: config.min_depth,
                max_depth: config.max_depth,
                input,
                output,
                output_view,
                params_buffer,
                bind_group,
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

    /// Record depth normalization for one tick.
    ///
    /// A capture that does not match the configured size, `R32Float`, or lacks
    /// `COPY_SRC` is skipped with a warning and the previous forcing stays.
    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: &LiquidParams,
        captured_depth: &wgpu::Texture,
    ) {
        let Some(res) = self.slot.resources() else {
            log::trace!("{PASS}: render skipped, pass not ready");
            return;
        };

        if !slot::matches_input(captured_depth, res.width, res.height, FORMAT) {
            log::warn!(
                "{PASS}: captured depth {}x{} {:?} does not match {}x{} {:?} with COPY_SRC, tick skipped",
                captured_depth.width(),
                captured_depth.height(),
                captured_depth.format(),
                res.width,
                res.height,
                FORMAT
            );
            return;
        }

        let uniforms = DepthParams::new(res.min_depth, res.max_depth, params.force_factor, res.width, res.height);
        queue.write_buffer(&res.params_buffer, 0, bytemuck::bytes_of(&uniforms));

        slot::copy_texture(encoder, captured_depth, &res.input);
        slot::dispatch_2d(encoder, "Surface Depth Normalize", &self.pipeline, &res.bind_group, res.width, res.height);

        if let Some(target) = &res.debug_target {
            slot::copy_texture(encoder, &res.output, target);
        }
    }
}
