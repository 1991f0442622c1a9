use kiln_math::Vec4;
use rand::rngs::StdRng;

use super::{resolve_hit, TileIntegrator, WorkerScratch};
use crate::scene_view::SceneView;

/// Shows `|Ng|` of the hit triangle as RGB.
pub struct GeometryNormal;

impl TileIntegrator for GeometryNormal {
    fn name(&self) -> &'static str {
        "geometry_normal"
    }

    fn shade_tile(
        &self,
        scene: &SceneView,
        _rng: &mut StdRng,
        scratch: &mut WorkerScratch,
        cells: &mut [Vec4],
    ) {
        for (rayhit, &slot) in scratch.primary.iter().zip(&scratch.slots) {
            let color = match resolve_hit(scene, rayhit) {
                Some(surface) => surface.geometric_normal.abs().extend(1.0),
                None => Vec4::new(0.0, 0.0, 0.0, 1.0),
            };
            cells[slot] += color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{floor, render_pass, setup};
    use crate::framebuffer::TiledFramebuffer;
    use crate::settings::IntegratorKind;
    use kiln_math::{Vec3, Vec4};

    #[test]
    fn test_floor_normal_from_both_sides() {
        for eye in [Vec3::new(0.0, 4.0, 0.0), Vec3::new(0.0, -4.0, 0.0)] {
            let integrator = setup(IntegratorKind::GeometryNormal, floor(), eye, Vec3::ZERO, 4, 4);
            let fb = TiledFramebuffer::new(4, 4, 4);
            render_pass(&integrator, &fb, 0);
            render_pass(&integrator, &fb, 1);

            let mut image = vec![Vec4::ZERO; 16];
            fb.copy_to(&mut image);
            for cell in image {
                assert!((cell - Vec4::new(0.0, 2.0, 0.0, 2.0)).length() < 1e-5);
            }
        }
    }
}
