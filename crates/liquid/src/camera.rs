//! Fixed virtual camera for caustic projection.

use glam::{Mat4, Vec3};

/// Orthographic camera looking straight down at the surface plane (z = 0).
///
/// The eye sits on +Z halfway through the clip range so the plane always lands
/// mid-depth; x and y map 1:1 from [-1, 1] surface space to clip space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CausticCamera {
    pub near_clip_z: f32,
    pub far_clip_z: f32,
}

impl Default for CausticCamera {
    fn default() -> Self {
        Self { near_clip_z: 0.0, far_clip_z: 2.0 }
    }
}

impl CausticCamera {
    pub fn new(near_clip_z: f32, far_clip_z: f32) -> Self {
        Self { near_clip_z, far_clip_z }
    }

    pub fn eye(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, (self.near_clip_z + self.far_clip_z) * 0.5)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, self.near_clip_z, self.far_clip_z)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}
