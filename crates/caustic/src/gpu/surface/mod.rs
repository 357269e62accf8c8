//! Depth-driven liquid surface on the GPU.
//!
//! Four passes run once per tick, each reading the previous one's output:
//! - Depth: captured depth -> penetration (forcing)
//! - Height: damped wave integration with current/previous/next rotation
//! - Normal: central-difference normals
//! - Caustic: refracted grid projection into an intensity target

mod caustic;
mod depth;
mod height;
mod mesh;
mod normal;
mod slot;

use std::sync::Arc;

use liquid::{BodyConfig, LiquidParams};

pub use caustic::{CausticPassConfig, SurfaceCausticPass};
pub use depth::{DepthPassConfig, SurfaceDepthPass};
pub use height::{HeightPassConfig, SurfaceHeightPass};
pub use mesh::{build_grid, CausticGridMesh, CausticVertex};
pub use normal::{NormalPassConfig, SurfaceNormalPass};
pub use slot::PassSlot;

use super::{GpuError, SimulationContext};

/// Per-pass configuration derived from a [`BodyConfig`].
#[derive(Clone, Debug)]
pub struct SurfacePipelineConfig {
    pub depth: DepthPassConfig,
    pub height: HeightPassConfig,
    pub normal: NormalPassConfig,
    pub caustic: CausticPassConfig,
}

impl SurfacePipelineConfig {
    pub fn from_body(body: &BodyConfig) -> Self {
        Self {
            depth: DepthPassConfig::from_body(body),
            height: HeightPassConfig::from_body(body),
            normal: NormalPassConfig::from_body(body),
            caustic: CausticPassConfig::from_body(body),
        }
    }

    /// Every pass must run at the simulation resolution.
    fn check_resolution(&self, width: u32, height: u32) -> Result<(), GpuError> {
        let passes = [
            ("depth", self.depth.width, self.depth.height),
            ("height", self.height.width, self.height.height),
            ("normal", self.normal.width, self.normal.height),
            ("caustic", self.caustic.width, self.caustic.height),
        ];
        for (pass, w, h) in passes {
            if (w, h) != (width, height) {
                return Err(GpuError::InvalidConfig(format!(
                    "{pass} pass configured for {w}x{h}, simulation runs at {width}x{height}"
                )));
            }
        }
        Ok(())
    }
}

/// The four surface passes, driven together once per tick.
pub struct SurfacePipeline {
    params: LiquidParams,
    pub depth: SurfaceDepthPass,
    pub height: SurfaceHeightPass,
    pub normal: SurfaceNormalPass,
    pub caustic: SurfaceCausticPass,
    ticks: u64,
}

impl SurfacePipeline {
    /// Validate `body`, build every pass and allocate its resources.
    pub fn new(ctx: &SimulationContext, body: &BodyConfig) -> Result<Self, GpuError> {
        body.validate()
            .map_err(|e| GpuError::InvalidConfig(e.to_string()))?;
        Self::with_config(ctx, body.liquid, SurfacePipelineConfig::from_body(body))
    }

    /// Build from explicit pass configs (e.g. with debug targets attached).
    ///
    /// Passes whose allocation fails stay inert; check [`is_ready`](Self::is_ready).
    pub fn with_config(
        ctx: &SimulationContext,
        params: LiquidParams,
        config: SurfacePipelineConfig,
    ) -> Result<Self, GpuError> {
        params
            .validate()
            .map_err(|e| GpuError::InvalidConfig(e.to_string()))?;

        let max = ctx.max_texture_dimension();
        if params.depth_texture_width > max || params.depth_texture_height > max {
            return Err(GpuError::InvalidConfig(format!(
                "resolution {}x{} exceeds device maximum {max}",
                params.depth_texture_width, params.depth_texture_height
            )));
        }
        config.check_resolution(params.depth_texture_width, params.depth_texture_height)?;

        let device = &ctx.device;
        let mut pipeline = Self {
            params,
            depth: SurfaceDepthPass::new(device),
            height: SurfaceHeightPass::new(device),
            normal: SurfaceNormalPass::new(device),
            caustic: SurfaceCausticPass::new(device),
            ticks: 0,
        };
        pipeline.init_passes(ctx, config);
        Ok(pipeline)
    }

    /// Allocate every pass. Idempotent per pass.
    pub fn init_passes(&mut self, ctx: &SimulationContext, config: SurfacePipelineConfig) {
        self.depth.init_pass(&ctx.device, config.depth);
        self.height.init_pass(&ctx.device, config.height);
        self.normal.init_pass(&ctx.device, &ctx.queue, config.normal);
        self.caustic.init_pass(&ctx.device, config.caustic);

        if self.is_ready() {
            log::info!(
                "Surface pipeline ready: {}x{}",
                self.params.depth_texture_width,
                self.params.depth_texture_height
            );
        }
    }

    pub fn is_ready(&self) -> bool {
        self.depth.is_valid_pass()
            && self.height.is_valid_pass()
            && self.normal.is_valid_pass()
            && self.caustic.is_valid_pass()
    }

    pub fn params(&self) -> &LiquidParams {
        &self.params
    }

    /// Replace tuning for subsequent ticks. Resolution changes are rejected;
    /// they need a new pipeline.
    pub fn set_params(&mut self, params: LiquidParams) -> Result<(), GpuError> {
        params
            .validate()
            .map_err(|e| GpuError::InvalidConfig(e.to_string()))?;
        if params.depth_texture_width != self.params.depth_texture_width
            || params.depth_texture_height != self.params.depth_texture_height
        {
            return Err(GpuError::InvalidConfig(
                "resolution is fixed once passes are initialized".into(),
            ));
        }
        self.params = params;
        Ok(())
    }

    /// Ticks recorded so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Record Depth -> Height -> Normal -> Caustic into `encoder`.
    pub fn encode_tick(
        &mut self,
        ctx: &SimulationContext,
        encoder: &mut wgpu::CommandEncoder,
        captured_depth: &wgpu::Texture,
    ) {
        let params = self.params;
        let (device, queue) = (&ctx.device, &ctx.queue);

        self.depth.render(queue, encoder, &params, captured_depth);

        let Some(forcing) = self.depth.output_view() else {
            log::trace!("Surface tick stopped after depth pass");
            return;
        };
        self.height.render(device, queue, encoder, &params, forcing);

        let Some(height) = self.height.output_view() else {
            log::trace!("Surface tick stopped after height pass");
            return;
        };
        self.normal.render(device, encoder, height);

        let Some(normals) = self.normal.output_view() else {
            log::trace!("Surface tick stopped after normal pass");
            return;
        };
        self.caustic.render(device, queue, encoder, &params, normals);

        self.ticks += 1;
    }

    /// Record and submit one tick. Returns `None` when no pass is ready.
    pub fn tick(&mut self, ctx: &SimulationContext, captured_depth: &wgpu::Texture) -> Option<wgpu::SubmissionIndex> {
        if !self.depth.is_valid_pass() {
            log::trace!("Surface tick skipped, depth pass not ready");
            return None;
        }
        Some(ctx.submit_tick("Surface Tick", |encoder| {
            self.encode_tick(ctx, encoder, captured_depth)
        }))
    }

    pub fn height_texture(&self) -> Option<&Arc<wgpu::Texture>> {
        self.height.current_texture()
    }

    pub fn normal_texture(&self) -> Option<&Arc<wgpu::Texture>> {
        self.normal.output_texture()
    }

    pub fn normal_view(&self) -> Option<&wgpu::TextureView> {
        self.normal.output_view()
    }

    pub fn caustic_texture(&self) -> Option<&Arc<wgpu::Texture>> {
        self.caustic.output_texture()
    }

    pub fn caustic_view(&self) -> Option<&wgpu::TextureView> {
        self.caustic.output_view()
    }
}

/// An `R32Float` texture usable as a depth capture for [`SurfacePipeline::tick`].
pub fn create_capture_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    slot::create_texture(
        device,
        "Surface Depth Capture",
        width,
        height,
        wgpu::TextureFormat::R32Float,
        wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

/// Fill a capture texture created by [`create_capture_texture`].
pub fn write_capture(queue: &wgpu::Queue, texture: &wgpu::Texture, depth: &[f32]) -> Result<(), GpuError> {
    let texels = texture.width() as usize * texture.height() as usize;
    if depth.len() != texels {
        return Err(GpuError::InvalidConfig(format!(
            "capture expects {texels} texels, got {}",
            depth.len()
        )));
    }
    slot::write_r32_texture(queue, texture, depth);
    Ok(())
}
