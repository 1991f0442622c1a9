//! Scene geometry paired with the intersector built over it.

use std::sync::Arc;

use kiln_core::SceneGeometry;
use kiln_math::{Ray, Vec2, Vec3};

use crate::bvh::BvhIntersector;
use crate::intersector::RayIntersector;
use crate::ray::{Coherence, RayHit};

/// Which side of a triangle a ray hit. Counter-clockwise is front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

/// Surface attributes interpolated at a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    /// Interpolated vertex normal, unit length, not face-forwarded
    pub shading_normal: Vec3,
    /// Unit geometric normal of the triangle, not face-forwarded
    pub geometric_normal: Vec3,
    pub tex_coords: Vec2,
    pub facing: Facing,
}

/// Read-only view of a scene shared by all render workers.
///
/// Cloning is cheap; geometry and intersector are reference counted.
#[derive(Clone)]
pub struct SceneView {
    geometry: Arc<SceneGeometry>,
    intersector: Arc<dyn RayIntersector>,
}

impl SceneView {
    pub fn new(geometry: Arc<SceneGeometry>, intersector: Arc<dyn RayIntersector>) -> Self {
        Self {
            geometry,
            intersector,
        }
    }

    /// Build a [`BvhIntersector`] over `geometry`.
    pub fn from_geometry(geometry: SceneGeometry) -> Self {
        let intersector = Arc::new(BvhIntersector::new(&geometry));
        Self::new(Arc::new(geometry), intersector)
    }

    pub fn geometry(&self) -> &SceneGeometry {
        &self.geometry
    }

    pub fn intersector(&self) -> &dyn RayIntersector {
        self.intersector.as_ref()
    }

    #[inline]
    pub fn intersect(&self, rayhit: &mut RayHit) -> bool {
        self.intersector.intersect(rayhit)
    }

    #[inline]
    pub fn occluded(&self, ray: &Ray) -> bool {
        self.intersector.occluded(ray)
    }

    pub fn intersect_batch(&self, rayhits: &mut [RayHit], coherence: Coherence) {
        self.intersector.intersect_batch(rayhits, coherence)
    }

    pub fn occluded_batch(&self, rays: &[Ray], occluded: &mut [bool], coherence: Coherence) {
        self.intersector.occluded_batch(rays, occluded, coherence)
    }

    /// Interpolate surface attributes at a hit.
    ///
    /// `None` on a miss, or when the reported ids do not name a triangle of
    /// this scene, or when the barycentrics are not finite.
    pub fn eval_hit_point(&self, rayhit: &RayHit) -> Option<SurfacePoint> {
        let hit = &rayhit.hit;
        if !hit.is_valid() || !(hit.u.is_finite() && hit.v.is_finite() && hit.t.is_finite()) {
            return None;
        }

        let triangle = self.geometry.triangle(hit.submesh_id, hit.triangle_id)?;
        let [a, b, c] = self.geometry.triangle_vertices(triangle)?;
        let w = 1.0 - hit.u - hit.v;

        let position = a.position * w + b.position * hit.u + c.position * hit.v;
        let tex_coords = a.tex_coords * w + b.tex_coords * hit.u + c.tex_coords * hit.v;

        let ng = (b.position - a.position).cross(c.position - a.position);
        let geometric_normal = ng.normalize_or_zero();
        let shading_normal = (a.normal * w + b.normal * hit.u + c.normal * hit.v)
            .try_normalize()
            .unwrap_or(geometric_normal);

        let facing = if ng.dot(rayhit.ray.direction) < 0.0 {
            Facing::Front
        } else {
            Facing::Back
        };

        Some(SurfacePoint {
            position,
            shading_normal,
            geometric_normal,
            tex_coords,
            facing,
        })
    }
}
