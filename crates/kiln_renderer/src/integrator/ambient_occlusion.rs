//! Ambient occlusion: fraction of the cosine-weighted hemisphere above a hit
//! that is unoccluded within a maximum distance.

use kiln_math::{face_forward, orthonormal_basis, sample_hemisphere_cosine, Ray, Vec4};
use rand::rngs::StdRng;
use rand::Rng;

use super::{resolve_hit, TileIntegrator, WorkerScratch};
use crate::ray::Coherence;
use crate::scene_view::SceneView;
use crate::settings::AoSettings;

pub struct AmbientOcclusion {
    settings: AoSettings,
}

impl AmbientOcclusion {
    pub fn new(mut settings: AoSettings) -> Self {
        settings.sqrt_sample_count = settings.sqrt_sample_count.max(1);
        Self { settings }
    }
}

impl TileIntegrator for AmbientOcclusion {
    fn name(&self) -> &'static str {
        "ambient_occlusion"
    }

    fn rays_per_hit(&self) -> usize {
        self.settings.ray_count()
    }

    fn shade_tile(
        &self,
        scene: &SceneView,
        rng: &mut StdRng,
        scratch: &mut WorkerScratch,
        cells: &mut [Vec4],
    ) {
        let strata = self.settings.sqrt_sample_count;
        let inv_strata = 1.0 / strata as f32;
        let ray_count = self.settings.ray_count();

        for (rayhit, &slot) in scratch.primary.iter().zip(&scratch.slots) {
            let Some(surface) = resolve_hit(scene, rayhit) else {
                cells[slot] += Vec4::new(0.0, 0.0, 0.0, 1.0);
                continue;
            };

            let normal = face_forward(surface.shading_normal, -rayhit.ray.direction);
            let (tangent, bitangent) = orthonormal_basis(normal);
            let origin = surface.position + normal * self.settings.epsilon;

            for j in 0..strata {
                for i in 0..strata {
                    let u1 = (i as f32 + rng.gen::<f32>()) * inv_strata;
                    let u2 = (j as f32 + rng.gen::<f32>()) * inv_strata;
                    let local = sample_hemisphere_cosine(u1, u2);
                    let direction = tangent * local.x + bitangent * local.y + normal * local.z;

                    scratch.occlusion_rays.push(Ray::with_extent(
                        origin,
                        direction,
                        0.0,
                        self.settings.max_distance,
                    ));
                }
            }
            scratch.owners.push(slot);
        }

        scratch.occluded.resize(scratch.occlusion_rays.len(), false);
        scene.occluded_batch(
            &scratch.occlusion_rays,
            &mut scratch.occluded,
            Coherence::Incoherent,
        );

        for (&slot, results) in scratch
            .owners
            .iter()
            .zip(scratch.occluded.chunks_exact(ray_count))
        {
            let visible = results.iter().filter(|&&occluded| !occluded).count();
            let fraction = visible as f32 / ray_count as f32;
            cells[slot] += Vec4::new(fraction, fraction, fraction, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{floor, render_pass, setup};
    use crate::framebuffer::TiledFramebuffer;
    use crate::settings::IntegratorKind;
    use kiln_math::{Vec3, Vec4};

    fn render_once(integrator: &crate::Integrator, size: usize, tile_size: usize) -> Vec<Vec4> {
        let fb = TiledFramebuffer::new(tile_size, size, size);
        render_pass(integrator, &fb, 0);
        let mut image = vec![Vec4::ZERO; fb.pixel_count()];
        fb.copy_to(&mut image);
        image
    }

    #[test]
    fn test_open_floor_is_unoccluded() {
        let integrator = setup(
            IntegratorKind::AmbientOcclusion,
            floor(),
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::ZERO,
            8,
            4,
        );

        for cell in render_once(&integrator, 8, 4) {
            assert_eq!(cell, Vec4::ONE);
        }
    }

    #[test]
    fn test_inside_closed_box_is_fully_occluded() {
        let mut geometry = kiln_core::SceneGeometry::new();
        geometry.append_box("room", Vec3::splat(-1.0), Vec3::splat(1.0));

        // Camera inside the box looking at the floor (its back side)
        let integrator = setup(
            IntegratorKind::AmbientOcclusion,
            geometry,
            Vec3::new(0.0, 0.5, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            8,
            8,
        );

        for cell in render_once(&integrator, 8, 8) {
            assert_eq!(cell, Vec4::new(0.0, 0.0, 0.0, 1.0));
        }
    }

    #[test]
    fn test_corner_is_partially_occluded() {
        // Floor plus a tall wall rising along x = 0.2; every visible floor
        // point lies within 1.3 units of it
        let mut geometry = floor();
        geometry.append_box(
            "wall",
            Vec3::new(0.2, 0.0, -50.0),
            Vec3::new(0.4, 50.0, 50.0),
        );

        let integrator = setup(
            IntegratorKind::AmbientOcclusion,
            geometry,
            Vec3::new(-0.5, 1.0, 0.0),
            Vec3::new(-0.5, 0.0, 0.0),
            4,
            4,
        );
        let image = render_once(&integrator, 4, 4);

        for cell in image {
            assert_eq!(cell.w, 1.0);
            assert!(cell.x > 0.0 && cell.x < 1.0, "visibility {}", cell.x);
            assert_eq!(cell.x, cell.y);
            assert_eq!(cell.y, cell.z);
        }
    }
}
