//! Ray query records exchanged with a [`RayIntersector`](crate::RayIntersector).

use kiln_math::{Ray, Vec3};

/// Id reported for "no geometry". Never a valid submesh or triangle id.
pub const INVALID_ID: u32 = u32::MAX;

/// Closest-hit data filled in by an intersector.
///
/// `u` and `v` weight the second and third triangle vertices; `ng` is the
/// unnormalized geometric normal `(v1 - v0) x (v2 - v0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub ng: Vec3,
    pub submesh_id: u32,
    /// Triangle index local to the submesh
    pub triangle_id: u32,
}

impl Hit {
    pub const NONE: Hit = Hit {
        t: f32::INFINITY,
        u: 0.0,
        v: 0.0,
        ng: Vec3::ZERO,
        submesh_id: INVALID_ID,
        triangle_id: INVALID_ID,
    };

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.submesh_id != INVALID_ID
    }
}

impl Default for Hit {
    fn default() -> Self {
        Self::NONE
    }
}

/// A ray together with its (initially empty) hit record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RayHit {
    pub ray: Ray,
    pub hit: Hit,
}

impl RayHit {
    pub fn new(ray: Ray) -> Self {
        Self { ray, hit: Hit::NONE }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.hit.is_valid()
    }

    /// Hit position along the ray. Meaningless on a miss.
    #[inline]
    pub fn hit_point(&self) -> Vec3 {
        self.ray.at(self.hit.t)
    }
}

/// Hint for batched queries about how similar the rays are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coherence {
    /// Neighbouring rays with nearly equal origin and direction (primary rays)
    Coherent,
    /// Unrelated directions (occlusion rays)
    Incoherent,
}
