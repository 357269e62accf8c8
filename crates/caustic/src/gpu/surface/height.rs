//! Surface height pass: damped wave integration with buffer rotation.
//!
//! Three `R32Float` textures hold the height history. Each tick the compute
//! shader reads `current`, `previous` and the forcing field and writes `next`;
//! then `current` is copied to `previous` and `next` to `current`, in that
//! order, inside the same encoder.

use std::sync::Arc;

use liquid::{BodyConfig, LiquidParams, WaveCoefficients};

use super::slot::{self, PassSlot};
use crate::gpu::params::HeightParams;
use crate::gpu::GpuError;

const PASS: &str = "Surface Height Pass";
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

#[derive(Clone, Debug)]
pub struct HeightPassConfig {
    pub width: u32,
    pub height: u32,
    pub debug_target: Option<Arc<wgpu::Texture>>,
}

impl HeightPassConfig {
    pub fn from_body(body: &BodyConfig) -> Self {
        Self {
            width: body.liquid.depth_texture_width,
            height: body.liquid.depth_texture_height,
            debug_target: None,
        }
    }
}

struct HeightResources {
    width: u32,
    height: u32,
    current: Arc<wgpu::Texture>,
    current_view: wgpu::TextureView,
    previous: Arc<wgpu::Texture>,
    previous_view: wgpu::TextureView,
    next: wgpu::Texture,
    next_view: wgpu::TextureView,
    params_buffer: wgpu::Buffer,
    debug_target: Option<Arc<wgpu::Texture>>,
    // Last derived coefficients, keyed by the params they came from
    coefficients: Option<(LiquidParams, WaveCoefficients)>,
}

/// Integrates the damped wave equation on the GPU.
pub struct SurfaceHeightPass {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    slot: PassSlot<HeightResources>,
    allocations: u32,
}

impl SurfaceHeightPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Surface Height Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/surface_height.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Height Layout"),
            entries: &[
                slot::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                slot::texture_entry(1, wgpu::ShaderStages::COMPUTE, false), // current
                slot::texture_entry(2, wgpu::ShaderStages::COMPUTE, false), // previous
                slot::texture_entry(3, wgpu::ShaderStages::COMPUTE, false), // forcing
                slot::storage_texture_entry(4, FORMAT),                     // next
            ],
        });

        let pipeline =
            slot::create_compute_pipeline(device, "Surface Height Pipeline", &shader, &bind_group_layout, "integrate_height");

        Self {
            pipeline,
            bind_group_layout,
            slot: PassSlot::Unconfigured,
            allocations: 0,
        }
    }

    /// Allocate the zero-initialized height history. No-op after the first call.
    pub fn init_pass(&mut self, device: &wgpu::Device, config: HeightPassConfig) {
        let attempted = self.slot.init_with(device, PASS, || {
            slot::check_resolution(device, config.width, config.height)?;

            let history_usage = wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST;
            let current = Arc::new(slot::create_texture(
                device,
                "Surface Height Current",
                config.width,
                config.height,
                FORMAT,
                history_usage,
            ));
            let previous = Arc::new(slot::create_texture(
                device,
                "Surface Height Previous",
                config.width,
                config.height,
                FORMAT,
                history_usage,
            ));
            let next = slot::create_texture(
                device,
                "Surface Height Next",
                config.width,
                config.height,
                FORMAT,
                wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            );

            let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Surface Height Params"),
                size: std::mem::size_of::<HeightParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });

            let debug_target =
                slot::accept_debug_target(PASS, config.debug_target.clone(), config.width, config.height, FORMAT);

            Ok(HeightResources {
                width: config.width,
                height: config.height,
                current_view: current.create_view(&Default::default()),
                current,
                previous_view: previous.create_view(&Default::default()),
                previous,
                next_view: next.create_view(&Default::default()),
                next,
                params_buffer,
                debug_target,
                coefficients: None,
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

    /// The pass output: height after the latest tick.
    pub fn output_view(&self) -> Option<&wgpu::TextureView> {
        self.slot.resources().map(|r| &r.current_view)
    }

    pub fn current_texture(&self) -> Option<&Arc<wgpu::Texture>> {
        self.slot.resources().map(|r| &r.current)
    }

    pub fn previous_texture(&self) -> Option<&Arc<wgpu::Texture>> {
        self.slot.resources().map(|r| &r.previous)
    }

    /// Coefficients used by the most recent render.
    pub fn coefficients(&self) -> Option<&WaveCoefficients> {
        self.slot
            .resources()
            .and_then(|r| r.coefficients.as_ref())
            .map(|(_, c)| c)
    }

    /// Upload an explicit height state into `current` and `previous`.
    pub fn seed(&self, queue: &wgpu::Queue, current: &[f32], previous: &[f32]) -> Result<(), GpuError> {
        let res = self
            .slot
            .resources()
            .ok_or_else(|| GpuError::InvalidConfig(format!("{PASS} is not initialized")))?;

        let texels = res.width as usize * res.height as usize;
        if current.len() != texels || previous.len() != texels {
            return Err(GpuError::InvalidConfig(format!(
                "seed expects {texels} texels, got {} current and {} previous",
                current.len(),
                previous.len()
            )));
        }

        slot::write_r32_texture(queue, &res.current, current);
        slot::write_r32_texture(queue, &res.previous, previous);
        Ok(())
    }

    /// Record one height integration step and the history rotation.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: &LiquidParams,
        forcing_view: &wgpu::TextureView,
    ) {
        let Some(res) = self.slot.resources_mut() else {
            log::trace!("{PASS}: render skipped, pass not ready");
            return;
        };

        let cached = res
            .coefficients
            .filter(|(derived_from, _)| derived_from == params)
            .map(|(_, c)| c);
        let coefficients = match cached {
            Some(c) => c,
            None => {
                let c = WaveCoefficients::derive(params);
                log::debug!(
                    "{PASS}: coefficients k1={:.6} k2={:.6} k3={:.6} maxT={:.6}",
                    c.k1,
                    c.k2,
                    c.k3,
                    c.max_t
                );
                res.coefficients = Some((*params, c));
                c
            }
        };

        let uniforms = HeightParams::new(&coefficients, res.width, res.height);
        queue.write_buffer(&res.params_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Height Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: res.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&res.current_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&res.previous_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(forcing_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&res.next_view),
                },
            ],
        });

        slot::dispatch_2d(encoder, "Surface Height Integrate", &self.pipeline, &bind_group, res.width, res.height);

        // previous must be written before current is overwritten
        slot::copy_texture(encoder, &res.current, &res.previous);
        slot::copy_texture(encoder, &res.next, &res.current);

        if let Some(target) = &res.debug_target {
            slot::copy_texture(encoder, &res.current, target);
        }
    }
}
