//! CPU reference of the surface stages.
//!
//! Mirrors the GPU passes texel for texel so GPU output can be checked against
//! it and so the wave behaviour can be tested without an adapter:
//! depth normalization, height integration with buffer rotation, and normal
//! reconstruction.

use glam::Vec3;

use crate::coefficients::WaveCoefficients;
use crate::params::LiquidParams;

/// Penetration depth for one captured sample.
///
/// `raw` is linear depth below the surface. Samples outside
/// `[min_depth, max_depth]` are clamped first, so an empty capture (far plane)
/// yields zero forcing.
#[inline]
pub fn normalize_depth(raw: f32, min_depth: f32, max_depth: f32, force_factor: f32) -> f32 {
    force_factor * (max_depth - raw.clamp(min_depth, max_depth))
}

/// Height field state for one liquid body.
///
/// Three buffers like the GPU pass: `current`, `previous` and a scratch `next`
/// that is rotated in after every step.
pub struct SurfaceSimulation {
    params: LiquidParams,
    coefficients: WaveCoefficients,
    width: usize,
    height: usize,
    current: Vec<f32>,
    previous: Vec<f32>,
    next: Vec<f32>,
    ticks: u64,
}

impl SurfaceSimulation {
    pub fn new(params: LiquidParams) -> Self {
        let width = params.depth_texture_width.max(1) as usize;
        let height = params.depth_texture_height.max(1) as usize;
        let cells = width * height;
        Self {
            coefficients: WaveCoefficients::derive(&params),
            params,
            width,
            height,
            current: vec![0.0; cells],
            previous: vec![0.0; cells],
            next: vec![0.0; cells],
            ticks: 0,
        }
    }

    pub fn params(&self) -> &LiquidParams {
        &self.params
    }

    pub fn coefficients(&self) -> &WaveCoefficients {
        &self.coefficients
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height_cells(&self) -> usize {
        self.height
    }

    /// Number of completed steps.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Current height at texel (x, y).
    pub fn height(&self, x: usize, y: usize) -> f32 {
        self.current[self.idx(x, y)]
    }

    pub fn current(&self) -> &[f32] {
        &self.current
    }

    pub fn previous(&self) -> &[f32] {
        &self.previous
    }

    /// Replace the height history. Slices shorter than the grid leave the
    /// remaining texels untouched.
    pub fn seed(&mut self, current: &[f32], previous: &[f32]) {
        let n = self.current.len();
        self.current[..current.len().min(n)].copy_from_slice(&current[..current.len().min(n)]);
        self.previous[..previous.len().min(n)].copy_from_slice(&previous[..previous.len().min(n)]);
    }

    /// Convert a raw depth capture into forcing for [`step`](Self::step).
    pub fn forcing_from_capture(&self, raw: &[f32], min_depth: f32, max_depth: f32) -> Vec<f32> {
        raw.iter()
            .map(|&d| normalize_depth(d, min_depth, max_depth, self.params.force_factor))
            .collect()
    }

    /// Edge-clamped sample of the current height.
    #[inline]
    fn sample_clamped(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.current[cy * self.width + cx]
    }

    /// Advance one tick with the given forcing depth (one value per texel;
    /// missing values count as zero).
    pub fn step(&mut self, forcing: &[f32]) {
        let WaveCoefficients { k1, k2, k3, attenuation, .. } = self.coefficients;

        for y in 0..self.height {
            for x in 0..self.width {
                let (xi, yi) = (x as isize, y as isize);
                let left = self.sample_clamped(xi - 1, yi);
                let right = self.sample_clamped(xi + 1, yi);
                let down = self.sample_clamped(xi, yi - 1);
                let up = self.sample_clamped(xi, yi + 1);
                let avg = (((left + right) + down) + up) * 0.25;

                let i = self.idx(x, y);
                let d = forcing.get(i).copied().unwrap_or(0.0);
                self.next[i] = attenuation * (k1 * avg + k2 * self.previous[i] + k3 * d);
            }
        }

        // current -> previous, next -> current
        std::mem::swap(&mut self.previous, &mut self.current);
        std::mem::swap(&mut self.current, &mut self.next);
        self.ticks += 1;
    }

    /// Advance one tick without forcing.
    pub fn step_free(&mut self) {
        self.step(&[]);
    }

    /// Unit normal at (x, y) from central differences of the current height.
    pub fn normal(&self, x: usize, y: usize, texel_world_size: f32) -> Vec3 {
        let (xi, yi) = (x as isize, y as isize);
        let dhx = self.sample_clamped(xi + 1, yi) - self.sample_clamped(xi - 1, yi);
        let dhy = self.sample_clamped(xi, yi + 1) - self.sample_clamped(xi, yi - 1);
        surface_normal(dhx, dhy, texel_world_size)
    }

    /// Normals for the whole grid, row-major.
    pub fn compute_normals(&self, texel_world_size: f32) -> Vec<Vec3> {
        let mut normals = Vec::with_capacity(self.current.len());
        for y in 0..self.height {
            for x in 0..self.width {
                normals.push(self.normal(x, y, texel_world_size));
            }
        }
        normals
    }

    /// Largest absolute height in the current buffer.
    pub fn max_abs_height(&self) -> f32 {
        self.current.iter().fold(0.0f32, |m, h| m.max(h.abs()))
    }
}

/// Normal of the surface spanned by tangents `(2t, 0, dhx)` and `(0, 2t, dhy)`.
#[inline]
pub fn surface_normal(dhx: f32, dhy: f32, texel_world_size: f32) -> Vec3 {
    let span = 2.0 * texel_world_size;
    let tx = Vec3::new(span, 0.0, dhx);
    let ty = Vec3::new(0.0, span, dhy);
    let n = tx.cross(ty);
    if n.length_squared() > 0.0 {
        n.normalize()
    } else {
        Vec3::Z
    }
}
