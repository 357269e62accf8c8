//! GPU shader parameter structs for the surface passes.
//!
//! `#[repr(C)]` structs uploaded to uniform buffers. Sizes are multiples of
//! 16 bytes to match WGSL uniform layout.

use bytemuck::{Pod, Zeroable};
use liquid::WaveCoefficients;

/// Depth normalization parameters (32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct DepthParams {
    pub min_depth: f32,
    pub max_depth: f32,
    pub force_factor: f32,
    pub _pad0: f32,
    pub width: u32,
    pub height: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl DepthParams {
    pub fn new(min_depth: f32, max_depth: f32, force_factor: f32, width: u32, height: u32) -> Self {
        Self {
            min_depth,
            max_depth,
            force_factor,
            _pad0: 0.0,
            width,
            height,
            _pad1: 0,
            _pad2: 0,
        }
    }
}

/// Damped wave update parameters (32 bytes).
///
/// Layout: [k1, k2, k3, attenuation, width, height, _pad, _pad]
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct HeightParams {
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub attenuation: f32,
    pub width: u32,
    pub height: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl HeightParams {
    pub fn new(coefficients: &WaveCoefficients, width: u32, height: u32) -> Self {
        Self {
            k1: coefficients.k1,
            k2: coefficients.k2,
            k3: coefficients.k3,
            attenuation: coefficients.attenuation,
            width,
            height,
            _pad0: 0,
            _pad1: 0,
        }
    }
}

/// Normal reconstruction parameters (16 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct NormalParams {
    pub texel_world_size: f32,
    pub _pad0: f32,
    pub width: u32,
    pub height: u32,
}

impl NormalParams {
    pub fn new(texel_world_size: f32, width: u32, height: u32) -> Self {
        Self {
            texel_world_size,
            _pad0: 0.0,
            width,
            height,
        }
    }
}

/// Caustic projection uniforms (80 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct CausticUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub refraction: f32,
    /// Ratio of refractive indices, air over water
    pub eta: f32,
    pub _pad0: f32,
    pub _pad1: f32,
}

/// Refractive index of water.
pub const WATER_IOR: f32 = 1.33;

impl CausticUniforms {
    pub fn new(view_proj: glam::Mat4, refraction: f32) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            refraction,
            eta: 1.0 / WATER_IOR,
            _pad0: 0.0,
            _pad1: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<DepthParams>(), 32);
        assert_eq!(std::mem::size_of::<HeightParams>(), 32);
        assert_eq!(std::mem::size_of::<NormalParams>(), 16);
        assert_eq!(std::mem::size_of::<CausticUniforms>(), 80);
    }
}
