//! Triangle primitive for the BVH.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use kiln_math::{Aabb, Interval, Ray, Vec3};

/// A scene triangle with the ids reported on a hit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BvhTriangle {
    v0: Vec3,
    edge1: Vec3,
    edge2: Vec3,
    pub submesh_id: u32,
    pub triangle_id: u32,
    pub bbox: Aabb,
}

/// Parametric hit on a triangle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

impl BvhTriangle {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, submesh_id: u32, triangle_id: u32) -> Self {
        Self {
            v0,
            edge1: v1 - v0,
            edge2: v2 - v0,
            submesh_id,
            triangle_id,
            bbox: Aabb::from_triangle(v0, v1, v2),
        }
    }

    /// Unnormalized geometric normal, counter-clockwise winding.
    #[inline]
    pub fn geometric_normal(&self) -> Vec3 {
        self.edge1.cross(self.edge2)
    }

    /// Möller-Trumbore intersection restricted to `ray_t`. Both sides hit.
    #[inline]
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<TriangleHit> {
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.edge2.dot(q);
        if !ray_t.contains(t) {
            return None;
        }

        Some(TriangleHit { t, u, v })
    }
}
