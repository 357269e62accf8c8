//! Liquid tuning parameters and body configuration.
//!
//! Everything here is plain data set once before the simulation starts.
//! [`BodyConfig`] is the file-level configuration (JSON); the GPU crate derives
//! its per-pass configs from it.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors from validating [`LiquidParams`] or [`BodyConfig`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("{0} must be finite")]
    NonFinite(&'static str),
    #[error("viscosity must be > 0 (got {0})")]
    NonPositiveViscosity(f32),
    #[error("velocity fraction must be in (0, 1] (got {0})")]
    VelocityOutOfRange(f32),
    #[error("attenuation coefficient must be in [0, 1] (got {0})")]
    AttenuationOutOfRange(f32),
    #[error("refraction must be >= 0 (got {0})")]
    NegativeRefraction(f32),
    #[error("depth texture resolution must be non-zero (got {width}x{height})")]
    ZeroResolution { width: u32, height: u32 },
    #[error("{0} must be > 0")]
    NonPositiveDimension(&'static str),
    #[error("caustic output scale must be >= 1")]
    ZeroOutputScale,
    #[error("caustic clip range is empty (near {near}, far {far})")]
    EmptyClipRange { near: f32, far: f32 },
}

/// Errors from loading or saving a [`BodyConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ParamError),
}

/// Simulation tuning for one liquid body.
///
/// Immutable for the duration of a tick. `velocity` is a fraction of the
/// CFL-derived maximum wave speed, so values above 1 are clamped when the
/// coefficients are derived.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidParams {
    /// Wave propagation speed, normalized against the stable maximum (0..1]
    pub velocity: f32,
    /// Damping coefficient (> 0)
    pub viscosity: f32,
    /// Scale applied to the normalized penetration depth
    pub force_factor: f32,
    /// Distance of the caustic receiving plane below the surface
    pub refraction: f32,
    /// Per-tick scale of the new height toward zero [0, 1]
    pub attenuation_coefficient: f32,
    /// Simulation grid width in texels
    pub depth_texture_width: u32,
    /// Simulation grid height in texels
    pub depth_texture_height: u32,
}

impl Default for LiquidParams {
    fn default() -> Self {
        Self {
            velocity: 0.5426512,
            viscosity: 0.15,
            force_factor: 1.49,
            refraction: 0.25,
            attenuation_coefficient: 0.99,
            depth_texture_width: 128,
            depth_texture_height: 128,
        }
    }
}

impl LiquidParams {
    /// Check every documented range.
    pub fn validate(&self) -> Result<(), ParamError> {
        let finite = [
            ("velocity", self.velocity),
            ("viscosity", self.viscosity),
            ("force_factor", self.force_factor),
            ("refraction", self.refraction),
            ("attenuation_coefficient", self.attenuation_coefficient),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ParamError::NonFinite(name));
            }
        }

        if self.viscosity <= 0.0 {
            return Err(ParamError::NonPositiveViscosity(self.viscosity));
        }
        let fraction = self.velocity.abs();
        if fraction == 0.0 || fraction > 1.0 {
            return Err(ParamError::VelocityOutOfRange(self.velocity));
        }
        if !(0.0..=1.0).contains(&self.attenuation_coefficient) {
            return Err(ParamError::AttenuationOutOfRange(self.attenuation_coefficient));
        }
        if self.refraction < 0.0 {
            return Err(ParamError::NegativeRefraction(self.refraction));
        }
        if self.depth_texture_width == 0 || self.depth_texture_height == 0 {
            return Err(ParamError::ZeroResolution {
                width: self.depth_texture_width,
                height: self.depth_texture_height,
            });
        }
        Ok(())
    }
}

/// Geometry used to project caustics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CausticMesh {
    /// A single quad spanning the whole target.
    Quad,
    /// A grid with one cell per body cell (`body_width / cell_size` cells across).
    Grid,
}

/// Caustic projection settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CausticSettings {
    /// Caustic target resolution as a multiple of the simulation resolution
    pub output_scale: u32,
    pub mesh: CausticMesh,
    /// Near clip of the virtual caustic camera
    pub near_clip_z: f32,
    /// Far clip of the virtual caustic camera
    pub far_clip_z: f32,
}

impl Default for CausticSettings {
    fn default() -> Self {
        Self {
            output_scale: 4,
            mesh: CausticMesh::Grid,
            near_clip_z: 0.0,
            far_clip_z: 2.0,
        }
    }
}

/// Configuration of one liquid body, set once before the simulation starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Spacing of surface mesh vertices in world units
    pub cell_size: f32,
    pub body_width: f32,
    pub body_height: f32,
    /// Depth of the volume; also the far end of the depth capture range
    pub body_depth: f32,
    pub liquid: LiquidParams,
    pub caustic: CausticSettings,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            cell_size: 15.0,
            body_width: 512.0,
            body_height: 512.0,
            body_depth: 512.0,
            liquid: LiquidParams::default(),
            caustic: CausticSettings::default(),
        }
    }
}

impl BodyConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        let dims = [
            ("cell_size", self.cell_size),
            ("body_width", self.body_width),
            ("body_height", self.body_height),
            ("body_depth", self.body_depth),
        ];
        for (name, value) in dims {
            if !value.is_finite() {
                return Err(ParamError::NonFinite(name));
            }
            if value <= 0.0 {
                return Err(ParamError::NonPositiveDimension(name));
            }
        }

        if self.caustic.output_scale == 0 {
            return Err(ParamError::ZeroOutputScale);
        }
        let (near, far) = (self.caustic.near_clip_z, self.caustic.far_clip_z);
        if !near.is_finite() || !far.is_finite() || near < 0.0 || far <= near {
            return Err(ParamError::EmptyClipRange { near, far });
        }

        self.liquid.validate()
    }

    /// World-space size of one simulation texel along X.
    pub fn texel_world_size(&self) -> f32 {
        self.body_width / self.liquid.depth_texture_width as f32
    }

    /// Caustic grid cells along X and Y for [`CausticMesh::Grid`].
    pub fn caustic_grid_cells(&self) -> (u32, u32) {
        match self.caustic.mesh {
            CausticMesh::Quad => (1, 1),
            CausticMesh::Grid => {
                let cells_x = (self.body_width / self.cell_size).round().max(1.0) as u32;
                let cells_y = (self.body_height / self.cell_size).round().max(1.0) as u32;
                (cells_x, cells_y)
            }
        }
    }

    /// Save configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(LiquidParams::default().validate().is_ok());
        assert!(BodyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_params() {
        let base = LiquidParams::default();

        let p = LiquidParams { viscosity: 0.0, ..base };
        assert_eq!(p.validate(), Err(ParamError::NonPositiveViscosity(0.0)));

        let p = LiquidParams { velocity: 1.5, ..base };
        assert_eq!(p.validate(), Err(ParamError::VelocityOutOfRange(1.5)));

        let p = LiquidParams { attenuation_coefficient: 1.1, ..base };
        assert_eq!(p.validate(), Err(ParamError::AttenuationOutOfRange(1.1)));

        let p = LiquidParams { depth_texture_width: 0, ..base };
        assert!(matches!(p.validate(), Err(ParamError::ZeroResolution { .. })));

        let p = LiquidParams { force_factor: f32::NAN, ..base };
        assert_eq!(p.validate(), Err(ParamError::NonFinite("force_factor")));
    }

    #[test]
    fn test_negative_velocity_uses_magnitude() {
        let p = LiquidParams { velocity: -0.5, ..LiquidParams::default() };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = BodyConfig::from_json(r#"{ "body_depth": 256.0, "liquid": { "viscosity": 0.3 } }"#)
            .expect("partial config should parse");
        assert_eq!(config.body_depth, 256.0);
        assert_eq!(config.liquid.viscosity, 0.3);
        assert_eq!(config.liquid.depth_texture_width, 128);
        assert_eq!(config.caustic.output_scale, 4);
    }

    #[test]
    fn test_json_rejects_invalid_config() {
        let err = BodyConfig::from_json(r#"{ "caustic": { "output_scale": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ParamError::ZeroOutputScale)));
    }

    #[test]
    fn test_caustic_grid_cells() {
        let mut config = BodyConfig::default();
        assert_eq!(config.caustic_grid_cells(), (34, 34));

        config.caustic.mesh = CausticMesh::Quad;
        assert_eq!(config.caustic_grid_cells(), (1, 1));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("liquid_body_{}.json", std::process::id()));
        let mut config = BodyConfig::default();
        config.liquid.refraction = 0.5;
        config.save_json(&path).expect("save");
        let loaded = BodyConfig::load_json(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
