use crate::ray::{Coherence, RayHit};
use kiln_math::Ray;

/// Ray-scene query backend.
///
/// Implementations are shared by all render workers and must answer queries
/// concurrently.
pub trait RayIntersector: Send + Sync {
    /// Find the closest hit with `tnear <= t <= tfar`. On a hit fills
    /// `rayhit.hit` and returns true; on a miss leaves it untouched.
    fn intersect(&self, rayhit: &mut RayHit) -> bool;

    /// True if anything lies within `[tnear, tfar]` along the ray.
    fn occluded(&self, ray: &Ray) -> bool;

    /// Closest-hit query for a batch of rays.
    fn intersect_batch(&self, rayhits: &mut [RayHit], _coherence: Coherence) {
        for rayhit in rayhits {
            self.intersect(rayhit);
        }
    }

    /// Occlusion query for a batch of rays; `occluded[i]` answers `rays[i]`.
    fn occluded_batch(&self, rays: &[Ray], occluded: &mut [bool], _coherence: Coherence) {
        debug_assert_eq!(rays.len(), occluded.len());
        for (ray, result) in rays.iter().zip(occluded.iter_mut()) {
            *result = self.occluded(ray);
        }
    }
}
