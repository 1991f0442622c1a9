//! Flat triangle geometry shared by the intersector and hit-point evaluation.
//!
//! All submeshes live in one vertex buffer and one triangle buffer. A
//! submesh is a contiguous range of triangles; its triangle indices are
//! stored already offset into the shared vertex buffer.

use kiln_math::{Aabb, Vec2, Vec3};

/// A mesh vertex: position, shading normal, texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coords: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }
}

/// Three vertex indices into [`SceneGeometry::vertices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Triangle(pub [u32; 3]);

/// A contiguous range of triangles loaded from one model part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMesh {
    pub name: String,
    pub triangle_offset: usize,
    pub triangle_count: usize,
    pub vertex_count: usize,
}

/// Vertex and triangle storage for a whole scene, grouped into submeshes.
///
/// Read-only once handed to the renderer.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
    pub submeshes: Vec<SubMesh>,
    bounds: Option<Aabb>,
}

impl SceneGeometry {
    /// Create empty geometry. An empty scene is valid: every ray misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a submesh. `triangles` index into `vertices` (local indices);
    /// they are rebased onto the shared vertex buffer.
    ///
    /// Returns the id of the new submesh.
    pub fn append(
        &mut self,
        name: impl Into<String>,
        vertices: &[Vertex],
        triangles: &[Triangle],
    ) -> usize {
        let vertex_offset = self.vertices.len() as u32;
        let triangle_offset = self.triangles.len();

        self.vertices.extend_from_slice(vertices);
        self.triangles.extend(
            triangles
                .iter()
                .map(|t| Triangle(t.0.map(|i| i + vertex_offset))),
        );

        if !vertices.is_empty() {
            let bounds = vertices
                .iter()
                .fold(self.bounds(), |b, v| b.include_point(v.position));
            self.bounds = Some(bounds);
        }

        self.submeshes.push(SubMesh {
            name: name.into(),
            triangle_offset,
            triangle_count: triangles.len(),
            vertex_count: vertices.len(),
        });

        self.submeshes.len() - 1
    }

    /// Append a planar quad. Corners must be counter-clockwise when seen
    /// from the side the normal points to.
    pub fn append_quad(&mut self, name: impl Into<String>, corners: [Vec3; 4]) -> usize {
        let normal = (corners[1] - corners[0])
            .cross(corners[2] - corners[0])
            .normalize_or_zero();
        let uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];

        let vertices: Vec<Vertex> = corners
            .iter()
            .zip(uvs)
            .map(|(&p, uv)| Vertex::new(p, normal, uv))
            .collect();
        let triangles = [Triangle([0, 1, 2]), Triangle([0, 2, 3])];

        self.append(name, &vertices, &triangles)
    }

    /// Append an axis-aligned box with outward-facing normals (one submesh,
    /// 12 triangles, flat shaded).
    pub fn append_box(&mut self, name: impl Into<String>, min: Vec3, max: Vec3) -> usize {
        let center = (min + max) * 0.5;
        let half = (max - min) * 0.5;
        let axes = [Vec3::X, Vec3::Y, Vec3::Z];

        let mut vertices = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(12);

        for axis in 0..3 {
            for sign in [-1.0f32, 1.0] {
                let n = axes[axis] * sign;
                // u x v == axes[axis]; swapping flips the winding for the negative face
                let (mut u, mut v) = (axes[(axis + 1) % 3], axes[(axis + 2) % 3]);
                if sign < 0.0 {
                    std::mem::swap(&mut u, &mut v);
                }
                let hu = u * half.dot(u).abs();
                let hv = v * half.dot(v).abs();
                let face_center = center + n * half[axis];

                let base = vertices.len() as u32;
                let corners = [
                    face_center - hu - hv,
                    face_center + hu - hv,
                    face_center + hu + hv,
                    face_center - hu + hv,
                ];
                let uvs = [
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                ];
                for (p, uv) in corners.into_iter().zip(uvs) {
                    vertices.push(Vertex::new(p, n, uv));
                }
                triangles.push(Triangle([base, base + 1, base + 2]));
                triangles.push(Triangle([base, base + 2, base + 3]));
            }
        }

        self.append(name, &vertices, &triangles)
    }

    /// Look up a triangle by submesh id and triangle index local to that
    /// submesh. `None` if either id is out of range.
    pub fn triangle(&self, submesh_id: u32, triangle_id: u32) -> Option<&Triangle> {
        let submesh = self.submeshes.get(submesh_id as usize)?;
        let local = triangle_id as usize;
        if local >= submesh.triangle_count {
            return None;
        }
        self.triangles.get(submesh.triangle_offset + local)
    }

    /// The three vertices of a triangle.
    pub fn triangle_vertices(&self, triangle: &Triangle) -> Option<[&Vertex; 3]> {
        let [a, b, c] = triangle.0;
        Some([
            self.vertices.get(a as usize)?,
            self.vertices.get(b as usize)?,
            self.vertices.get(c as usize)?,
        ])
    }

    /// Bounding box of all vertices, `Aabb::EMPTY` for an empty scene.
    pub fn bounds(&self) -> Aabb {
        self.bounds.unwrap_or(Aabb::EMPTY)
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Compute smooth vertex normals by averaging area-weighted face normals.
///
/// Counter-clockwise winding is assumed front facing. Vertices that belong
/// to no (or only degenerate) triangles get `+Y`.
pub fn compute_vertex_normals(positions: &[Vec3], triangles: &[Triangle]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for tri in triangles {
        let [i0, i1, i2] = tri.0.map(|i| i as usize);
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }

        let face_normal = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        normals[i0] += face_normal;
        normals[i1] += face_normal;
        normals[i2] += face_normal;
    }

    for normal in &mut normals {
        let len = normal.length();
        if len > 0.0 {
            *normal /= len;
        } else {
            *normal = Vec3::Y;
        }
    }

    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> (Vec<Vertex>, Vec<Triangle>) {
        let vertices = vec![
            Vertex::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z, Vec2::ZERO),
            Vertex::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z, Vec2::X),
            Vertex::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, Vec2::Y),
        ];
        (vertices, vec![Triangle([0, 1, 2])])
    }

    #[test]
    fn test_append_rebases_indices() {
        let (vertices, triangles) = unit_triangle();
        let mut geometry = SceneGeometry::new();

        assert_eq!(geometry.append("a", &vertices, &triangles), 0);
        assert_eq!(geometry.append("b", &vertices, &triangles), 1);

        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.triangle_count(), 2);
        assert_eq!(geometry.triangles[1], Triangle([3, 4, 5]));

        let second = &geometry.submeshes[1];
        assert_eq!(second.triangle_offset, 1);
        assert_eq!(second.triangle_count, 1);
        assert_eq!(second.vertex_count, 3);
    }

    #[test]
    fn test_triangle_lookup_is_local_to_submesh() {
        let (vertices, triangles) = unit_triangle();
        let mut geometry = SceneGeometry::new();
        geometry.append("a", &vertices, &triangles);
        geometry.append("b", &vertices, &triangles);

        assert_eq!(geometry.triangle(1, 0), Some(&Triangle([3, 4, 5])));
        assert_eq!(geometry.triangle(1, 1), None);
        assert_eq!(geometry.triangle(2, 0), None);
    }

    #[test]
    fn test_box_normals_point_outward() {
        let mut geometry = SceneGeometry::new();
        let min = Vec3::new(-1.0, -2.0, -3.0);
        let max = Vec3::new(1.0, 2.0, 3.0);
        geometry.append_box("box", min, max);

        assert_eq!(geometry.triangle_count(), 12);
        let center = (min + max) * 0.5;

        for tri in &geometry.triangles {
            let [a, b, c] = geometry.triangle_vertices(tri).unwrap();
            let geometric = (b.position - a.position).cross(c.position - a.position);
            let face_center = (a.position + b.position + c.position) / 3.0;

            assert!(geometric.dot(face_center - center) > 0.0);
            assert!(geometric.normalize().dot(a.normal) > 0.99);
        }

        let bounds = geometry.bounds();
        assert!((bounds.x.min + 1.0).abs() < 1e-5);
        assert!((bounds.z.max - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_quad_normal_follows_winding() {
        let mut geometry = SceneGeometry::new();
        geometry.append_quad(
            "floor",
            [
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(-1.0, 0.0, -1.0),
            ],
        );

        assert_eq!(geometry.triangle_count(), 2);
        assert!((geometry.vertices[0].normal - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_compute_vertex_normals() {
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(5.0, 5.0, 5.0), // unreferenced
        ];
        let normals = compute_vertex_normals(&positions, &[Triangle([0, 1, 2])]);

        for normal in &normals[..3] {
            assert!((*normal - Vec3::Z).length() < 1e-5);
        }
        assert_eq!(normals[3], Vec3::Y);
    }

    #[test]
    fn test_empty_geometry() {
        let geometry = SceneGeometry::new();
        assert!(geometry.is_empty());
        assert_eq!(geometry.bounds(), Aabb::EMPTY);
    }
}
