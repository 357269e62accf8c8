//! Depth-driven liquid surface simulation (CPU side).
//!
//! Holds everything about the surface that does not need a GPU:
//! - [`LiquidParams`] / [`BodyConfig`]: tuning and body configuration (JSON)
//! - [`WaveCoefficients`]: damped wave coefficient derivation
//! - [`SurfaceSimulation`]: CPU reference of the depth -> height -> normal stages
//! - [`CausticCamera`]: the fixed top-down camera used by the caustic projection
//!
//! # Example
//!
//! ```
//! use liquid::{LiquidParams, SurfaceSimulation};
//!
//! let params = LiquidParams {
//!     depth_texture_width: 32,
//!     depth_texture_height: 32,
//!     ..LiquidParams::default()
//! };
//! let mut surface = SurfaceSimulation::new(params);
//!
//! let mut forcing = vec![0.0; 32 * 32];
//! forcing[16 * 32 + 16] = 50.0;
//! surface.step(&forcing);
//! assert!(surface.height(16, 16) > 0.0);
//! ```

pub mod camera;
pub mod coefficients;
pub mod params;
pub mod surface;

pub use camera::CausticCamera;
pub use coefficients::{WaveCoefficients, SIMULATION_DT};
pub use params::{BodyConfig, CausticMesh, CausticSettings, ConfigError, LiquidParams, ParamError};
pub use surface::{normalize_depth, SurfaceSimulation};
pub use glam::Vec3;
