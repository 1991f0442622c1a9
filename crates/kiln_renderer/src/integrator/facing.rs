use kiln_math::Vec4;
use rand::rngs::StdRng;

use super::{resolve_hit, TileIntegrator, WorkerScratch};
use crate::scene_view::{Facing, SceneView};

const FRONT_COLOR: Vec4 = Vec4::new(1.0, 0.0, 1.0, 1.0);
const BACK_COLOR: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

/// Debug view of triangle orientation: magenta front faces, green back faces.
pub struct FacingDebug;

impl TileIntegrator for FacingDebug {
    fn name(&self) -> &'static str {
        "facing"
    }

    fn shade_tile(
        &self,
        scene: &SceneView,
        _rng: &mut StdRng,
        scratch: &mut WorkerScratch,
        cells: &mut [Vec4],
    ) {
        for (rayhit, &slot) in scratch.primary.iter().zip(&scratch.slots) {
            cells[slot] += match resolve_hit(scene, rayhit).map(|s| s.facing) {
                Some(Facing::Front) => FRONT_COLOR,
                Some(Facing::Back) => BACK_COLOR,
                None => Vec4::new(0.0, 0.0, 0.0, 1.0),
            };
        }
    }
}
