// Transform utilities for Mat4
//
// Extends glam::Mat4 with the helpers primary-ray generation needs.
// Note: glam::Mat4 already provides project_point3() and inverse()

use glam::{Mat4, Vec2, Vec3};

/// Extension trait for Mat4 to provide camera-space utilities
pub trait Mat4Ext {
    /// Map a point on the near plane in normalized device coordinates
    /// (`z = -1`, OpenGL convention) through this matrix, with perspective divide.
    /// Called on an inverse projection it yields the view-space point.
    fn unproject_ndc(&self, ndc: Vec2) -> Vec3;

    /// Translation column of an affine matrix. On a camera-to-world
    /// matrix this is the eye position.
    fn translation(&self) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn unproject_ndc(&self, ndc: Vec2) -> Vec3 {
        self.project_point3(ndc.extend(-1.0))
    }

    fn translation(&self) -> Vec3 {
        self.w_axis.truncate()
    }
}
