//! Bounding Volume Hierarchy (BVH) over scene triangles.
//!
//! Binary tree with a median split on the longest centroid axis. Large
//! subtrees are built in parallel with rayon.

use kiln_core::SceneGeometry;
use kiln_math::{Aabb, Interval, Ray};

use crate::intersector::RayIntersector;
use crate::ray::{Hit, RayHit};
use crate::triangle::BvhTriangle;

/// Maximum primitives per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// Subtrees with more primitives than this build both halves in parallel.
const PARALLEL_BUILD_THRESHOLD: usize = 4096;

/// BVH node - either a branch with two children or a leaf with triangles.
enum BvhNode {
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    Leaf {
        triangles: Vec<BvhTriangle>,
        bbox: Aabb,
    },
    /// Empty scene
    Empty,
}

impl BvhNode {
    fn new(triangles: Vec<BvhTriangle>) -> Self {
        if triangles.is_empty() {
            return BvhNode::Empty;
        }
        Self::build(triangles)
    }

    fn build(mut triangles: Vec<BvhTriangle>) -> Self {
        let n = triangles.len();
        let bounds = triangles
            .iter()
            .fold(Aabb::EMPTY, |acc, t| Aabb::surrounding(&acc, &t.bbox));

        if n <= LEAF_MAX_SIZE {
            return BvhNode::Leaf {
                triangles,
                bbox: bounds,
            };
        }

        let centroid_bounds = triangles
            .iter()
            .fold(Aabb::EMPTY, |acc, t| acc.include_point(t.bbox.centroid()));
        let axis = centroid_bounds.longest_axis();

        triangles.sort_unstable_by(|a, b| {
            let a_val = a.bbox.centroid()[axis];
            let b_val = b.bbox.centroid()[axis];
            a_val
                .partial_cmp(&b_val)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let right_triangles = triangles.split_off(n / 2);
        let left_triangles = triangles;

        let (left, right) = if n > PARALLEL_BUILD_THRESHOLD {
            rayon::join(
                || Self::build(left_triangles),
                || Self::build(right_triangles),
            )
        } else {
            (Self::build(left_triangles), Self::build(right_triangles))
        };

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox: bounds,
        }
    }

    /// Closest hit within `ray_t`; updates `rec` and returns true on a hit.
    fn hit(&self, ray: &Ray, ray_t: Interval, rec: &mut Hit) -> bool {
        match self {
            BvhNode::Empty => false,

            BvhNode::Leaf { triangles, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return false;
                }

                let mut hit_anything = false;
                let mut closest = ray_t.max;

                for tri in triangles {
                    if let Some(h) = tri.hit(ray, Interval::new(ray_t.min, closest)) {
                        hit_anything = true;
                        closest = h.t;
                        *rec = Hit {
                            t: h.t,
                            u: h.u,
                            v: h.v,
                            ng: tri.geometric_normal(),
                            submesh_id: tri.submesh_id,
                            triangle_id: tri.triangle_id,
                        };
                    }
                }
                hit_anything
            }

            BvhNode::Branch { left, right, bbox } => {
                if !bbox.hit(ray, ray_t) {
                    return false;
                }

                let hit_left = left.hit(ray, ray_t, rec);

                // Only check right up to closest hit
                let right_max = if hit_left { rec.t } else { ray_t.max };
                let hit_right = right.hit(ray, Interval::new(ray_t.min, right_max), rec);

                hit_left || hit_right
            }
        }
    }

    /// Any hit within `ray_t`.
    fn any_hit(&self, ray: &Ray, ray_t: Interval) -> bool {
        match self {
            BvhNode::Empty => false,
            BvhNode::Leaf { triangles, bbox } => {
                bbox.hit(ray, ray_t) && triangles.iter().any(|t| t.hit(ray, ray_t).is_some())
            }
            BvhNode::Branch { left, right, bbox } => {
                bbox.hit(ray, ray_t) && (left.any_hit(ray, ray_t) || right.any_hit(ray, ray_t))
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// CPU ray intersector over a [`SceneGeometry`].
///
/// Triangles are copied into the tree at construction; the geometry is not
/// referenced afterwards.
pub struct BvhIntersector {
    root: BvhNode,
    triangle_count: usize,
}

impl BvhIntersector {
    pub fn new(geometry: &SceneGeometry) -> Self {
        let start = std::time::Instant::now();
        let mut triangles = Vec::with_capacity(geometry.triangle_count());

        for (submesh_id, submesh) in geometry.submeshes.iter().enumerate() {
            let range = submesh.triangle_offset..submesh.triangle_offset + submesh.triangle_count;
            for (local_id, tri) in geometry.triangles[range].iter().enumerate() {
                let Some([a, b, c]) = geometry.triangle_vertices(tri) else {
                    log::warn!(
                        "Skipping triangle {} of submesh '{}' with out-of-range indices",
                        local_id,
                        submesh.name
                    );
                    continue;
                };
                triangles.push(BvhTriangle::new(
                    a.position,
                    b.position,
                    c.position,
                    submesh_id as u32,
                    local_id as u32,
                ));
            }
        }

        let triangle_count = triangles.len();
        let root = BvhNode::new(triangles);
        log::info!(
            "Built BVH: {} triangles, depth {} in {:.2?}",
            triangle_count,
            root.depth(),
            start.elapsed()
        );

        Self {
            root,
            triangle_count,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }
}

impl RayIntersector for BvhIntersector {
    fn intersect(&self, rayhit: &mut RayHit) -> bool {
        let ray = rayhit.ray;
        self.root.hit(&ray, ray.extent(), &mut rayhit.hit)
    }

    fn occluded(&self, ray: &Ray) -> bool {
        self.root.any_hit(ray, ray.extent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn scattered_boxes(count: usize) -> SceneGeometry {
        let mut rng = StdRng::seed_from_u64(7);
        let mut geometry = SceneGeometry::new();
        for i in 0..count {
            let min = Vec3::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
            );
            let size = Vec3::splat(rng.gen_range(0.2..2.0));
            geometry.append_box(format!("box{}", i), min, min + size);
        }
        geometry
    }

    fn brute_force(geometry: &SceneGeometry, ray: &Ray) -> Option<(f32, u32, u32)> {
        let mut closest: Option<(f32, u32, u32)> = None;
        for (submesh_id, submesh) in geometry.submeshes.iter().enumerate() {
            for local in 0..submesh.triangle_count {
                let tri = geometry.triangle(submesh_id as u32, local as u32).unwrap();
                let [a, b, c] = geometry.triangle_vertices(tri).unwrap();
                let prim = BvhTriangle::new(a.position, b.position, c.position, 0, 0);
                let max = closest.map_or(ray.tfar, |c| c.0);
                if let Some(h) = prim.hit(ray, Interval::new(ray.tnear, max)) {
                    closest = Some((h.t, submesh_id as u32, local as u32));
                }
            }
        }
        closest
    }

    #[test]
    fn test_bvh_empty() {
        let bvh = BvhIntersector::new(&SceneGeometry::new());
        assert!(matches!(bvh.root, BvhNode::Empty));

        let mut rayhit = RayHit::new(Ray::new(Vec3::ZERO, Vec3::NEG_Z));
        assert!(!bvh.intersect(&mut rayhit));
        assert!(!rayhit.is_hit());
        assert!(!bvh.occluded(&rayhit.ray));
    }

    #[test]
    fn test_bvh_single_box() {
        let mut geometry = SceneGeometry::new();
        geometry.append_box("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        let bvh = BvhIntersector::new(&geometry);

        let mut rayhit = RayHit::new(Ray::new(Vec3::new(0.2, 0.3, 5.0), Vec3::NEG_Z));
        assert!(bvh.intersect(&mut rayhit));
        assert!((rayhit.hit.t - 4.0).abs() < 1e-5);
        assert_eq!(rayhit.hit.submesh_id, 0);
        // Outward normal of the +Z face faces the ray
        assert!(rayhit.hit.ng.dot(Vec3::NEG_Z) < 0.0);
    }

    #[test]
    fn test_bvh_matches_brute_force() {
        let geometry = scattered_boxes(200);
        let bvh = BvhIntersector::new(&geometry);
        assert_eq!(bvh.triangle_count(), 200 * 12);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let origin = Vec3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize_or_zero();
            if direction == Vec3::ZERO {
                continue;
            }
            let ray = Ray::new(origin, direction);

            let expected = brute_force(&geometry, &ray);
            let mut rayhit = RayHit::new(ray);
            let hit = bvh.intersect(&mut rayhit);

            assert_eq!(hit, expected.is_some());
            assert_eq!(bvh.occluded(&ray), expected.is_some());
            if let Some((t, _, _)) = expected {
                assert!((rayhit.hit.t - t).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_occluded_respects_extent() {
        let mut geometry = SceneGeometry::new();
        geometry.append_box("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        let bvh = BvhIntersector::new(&geometry);

        let origin = Vec3::new(0.0, 0.0, 5.0);
        assert!(bvh.occluded(&Ray::with_extent(origin, Vec3::NEG_Z, 0.0, 100.0)));
        assert!(!bvh.occluded(&Ray::with_extent(origin, Vec3::NEG_Z, 0.0, 3.0)));
        assert!(!bvh.occluded(&Ray::with_extent(origin, Vec3::Z, 0.0, 100.0)));
    }

    #[test]
    fn test_batch_defaults_answer_each_ray() {
        let mut geometry = SceneGeometry::new();
        geometry.append_box("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        let bvh = BvhIntersector::new(&geometry);

        let rays = [
            Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z),
            Ray::new(Vec3::new(5.0, 5.0, 5.0), Vec3::NEG_Z),
        ];
        let mut occluded = [false; 2];
        bvh.occluded_batch(&rays, &mut occluded, crate::Coherence::Incoherent);
        assert_eq!(occluded, [true, false]);

        let mut rayhits: Vec<RayHit> = rays.iter().copied().map(RayHit::new).collect();
        bvh.intersect_batch(&mut rayhits, crate::Coherence::Coherent);
        assert!(rayhits[0].is_hit());
        assert!(!rayhits[1].is_hit());
    }

    #[test]
    fn test_parallel_build_matches_brute_force() {
        // 400 boxes = 4800 triangles, enough to take the rayon path
        let geometry = scattered_boxes(400);
        let bvh = BvhIntersector::new(&geometry);

        let ray = Ray::new(Vec3::new(0.0, 0.0, -30.0), Vec3::Z);
        let expected = brute_force(&geometry, &ray);
        let mut rayhit = RayHit::new(ray);
        assert_eq!(bvh.intersect(&mut rayhit), expected.is_some());
        if let Some((t, submesh, _)) = expected {
            assert!((rayhit.hit.t - t).abs() < 1e-4);
            assert_eq!(rayhit.hit.submesh_id, submesh);
        }
    }
}
