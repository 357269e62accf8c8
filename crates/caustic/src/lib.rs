//! GPU liquid surface - depth, height, normal and caustic passes on wgpu.
//!
//! The CPU-side parameters and reference simulation live in the `liquid` crate;
//! this crate owns the device, the four pass renderers and their WGSL shaders.

pub mod gpu;

pub use gpu::readback::read_texture;
pub use gpu::surface::{
    CausticPassConfig, DepthPassConfig, HeightPassConfig, NormalPassConfig, PassSlot,
    SurfacePipeline, SurfacePipelineConfig,
};
pub use gpu::{GpuError, SimulationContext};
