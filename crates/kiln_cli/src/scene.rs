//! Built-in scene used when no model is given.

use kiln_core::SceneGeometry;
use kiln_math::Vec3;

/// Ground plane with a few boxes; enough contact shadows to show ambient
/// occlusion converging.
pub fn demo_scene() -> SceneGeometry {
    let mut geometry = SceneGeometry::new();

    geometry.append_quad(
        "ground",
        [
            Vec3::new(-20.0, 0.0, 20.0),
            Vec3::new(20.0, 0.0, 20.0),
            Vec3::new(20.0, 0.0, -20.0),
            Vec3::new(-20.0, 0.0, -20.0),
        ],
    );

    geometry.append_box("pedestal", Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 0.5, 1.0));
    geometry.append_box("tower", Vec3::new(-0.4, 0.5, -0.4), Vec3::new(0.4, 2.5, 0.4));
    geometry.append_box("block_a", Vec3::new(1.6, 0.0, -0.6), Vec3::new(2.6, 1.0, 0.4));
    geometry.append_box("block_b", Vec3::new(-2.8, 0.0, 0.8), Vec3::new(-1.8, 0.6, 2.2));

    // Back wall
    geometry.append_quad(
        "wall",
        [
            Vec3::new(-6.0, 0.0, -3.0),
            Vec3::new(6.0, 0.0, -3.0),
            Vec3::new(6.0, 4.0, -3.0),
            Vec3::new(-6.0, 4.0, -3.0),
        ],
    );

    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_contents() {
        let geometry = demo_scene();
        assert_eq!(geometry.submesh_count(), 6);
        assert_eq!(geometry.triangle_count(), 2 + 4 * 12 + 2);

        // Wall faces the camera side (+Z)
        let wall = &geometry.submeshes[5];
        let v = geometry.vertices[geometry.vertex_count() - wall.vertex_count];
        assert!((v.normal - Vec3::Z).length() < 1e-5);
    }
}
