//! Damped wave coefficients.
//!
//! The height update is
//!
//! ```text
//! h(t+1) = attenuation * (K1 * avg4(h(t)) + K2 * h(t-1) + K3 * d(t))
//! ```
//!
//! with `K1..K3` derived from the velocity fraction, viscosity and grid spacing
//! at a fixed step of [`SIMULATION_DT`].

use crate::params::LiquidParams;

/// Fixed simulation step in seconds.
pub const SIMULATION_DT: f32 = 0.016;

/// Coefficients for one height update, plus the stability bound they were
/// derived against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveCoefficients {
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub attenuation: f32,
    /// Largest stable time step for these parameters
    pub max_t: f32,
    /// Velocity fraction actually used after clamping
    pub velocity_fraction: f32,
}

impl WaveCoefficients {
    /// Derive coefficients for `params`.
    ///
    /// The velocity fraction is taken by magnitude and clamped to [0, 1]; a
    /// clamp is reported with `log::warn!`. Within that range `dt` never
    /// exceeds the stable bound.
    pub fn derive(params: &LiquidParams) -> Self {
        let raw = params.velocity.abs();
        let fraction = if raw > 1.0 {
            log::warn!(
                "velocity fraction {} exceeds the stable maximum, clamping to 1.0",
                params.velocity
            );
            1.0
        } else if raw.is_finite() {
            raw
        } else {
            log::warn!("velocity fraction {} is not finite, using 0.0", params.velocity);
            0.0
        };

        let dt = SIMULATION_DT as f64;
        let spacing = 1.0 / params.depth_texture_width.max(1) as f64;
        let viscosity = params.viscosity as f64;

        let max_velocity = spacing / (2.0 * dt) * (viscosity * dt + 2.0).sqrt();
        let velocity = fraction as f64 * max_velocity;
        let velocity_sqr = velocity * velocity;
        let delta_size_sqr = spacing * spacing;

        let factor = velocity_sqr * dt * dt / delta_size_sqr;
        let i = viscosity * dt - 2.0;
        let j = viscosity * dt + 2.0;

        Self {
            k1: ((4.0 - 8.0 * factor) / j) as f32,
            k2: (i / j) as f32,
            k3: (2.0 * factor / j) as f32,
            attenuation: params.attenuation_coefficient,
            max_t: stability_bound_f64(viscosity, velocity_sqr, delta_size_sqr, dt) as f32,
            velocity_fraction: fraction,
        }
    }

    /// Largest stable step (`maxT`); never smaller than [`SIMULATION_DT`].
    pub fn stability_bound(&self) -> f32 {
        self.max_t
    }

    /// True when the fixed step lies inside the stable range.
    pub fn is_stable(&self) -> bool {
        // maxT1 meets dt exactly at full velocity; allow for rounding.
        SIMULATION_DT <= self.max_t * (1.0 + 1e-5)
    }

    /// Per-tick amplitude decay of an undriven surface, `sqrt(attenuation * |K2|)`.
    pub fn decay_per_tick(&self) -> f32 {
        (self.attenuation * self.k2.abs()).sqrt()
    }

    /// Ticks until an initial amplitude `from` decays below `to`, from
    /// [`decay_per_tick`](Self::decay_per_tick). `None` when the surface never
    /// decays (attenuation 1 with an undamped K2).
    pub fn ticks_to_settle(&self, from: f32, to: f32) -> Option<u32> {
        if from <= to {
            return Some(0);
        }
        let decay = self.decay_per_tick();
        if decay <= 0.0 {
            return Some(1);
        }
        if decay >= 1.0 {
            return None;
        }
        let ticks = ((to / from).ln() / decay.ln()).ceil();
        Some(ticks as u32)
    }
}

fn stability_bound_f64(viscosity: f64, velocity_sqr: f64, delta_size_sqr: f64, dt: f64) -> f64 {
    if velocity_sqr == 0.0 {
        return f64::INFINITY;
    }
    let delta_t = (viscosity * viscosity + 32.0 * velocity_sqr / delta_size_sqr).sqrt();
    let density = 8.0 * velocity_sqr / delta_size_sqr;
    let max_t1 = (viscosity + delta_t) / density;
    let max_t2 = (viscosity - delta_t) / density;
    let bound = if max_t2 > 0.0 { max_t1.min(max_t2) } else { max_t1 };
    bound.max(dt)
}
