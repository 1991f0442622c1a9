//! Wavefront OBJ loading into [`SceneGeometry`].
//!
//! Each OBJ model becomes one submesh. Faces are triangulated and
//! re-indexed to a single index stream by `tobj`; missing normals are
//! computed, missing texture coordinates default to zero.

use std::io::BufRead;
use std::path::Path;

use kiln_math::{Vec2, Vec3};
use thiserror::Error;

use crate::geometry::{compute_vertex_normals, SceneGeometry, Triangle, Vertex};

/// Errors that can occur while loading a model.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("No geometry found in model")]
    NoGeometry,

    #[error("Mesh '{mesh}' references vertex {index} but has {vertex_count} vertices")]
    InvalidIndex {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    }
}

/// Load an OBJ file. Materials are ignored.
pub fn load_obj<P: AsRef<Path>>(path: P) -> LoadResult<SceneGeometry> {
    let path = path.as_ref();
    log::info!("Loading OBJ: {}", path.display());

    let (models, _materials) = tobj::load_obj(path, &load_options())?;
    geometry_from_models(&models)
}

/// Load OBJ data from an in-memory reader. `mtllib` statements are ignored.
pub fn load_obj_from_reader<R: BufRead>(reader: &mut R) -> LoadResult<SceneGeometry> {
    let (models, _materials) = tobj::load_obj_buf(reader, &load_options(), |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;
    geometry_from_models(&models)
}

fn geometry_from_models(models: &[tobj::Model]) -> LoadResult<SceneGeometry> {
    let mut geometry = SceneGeometry::new();

    for model in models {
        let mesh = &model.mesh;
        let vertex_count = mesh.positions.len() / 3;

        if mesh.indices.is_empty() {
            log::debug!("Skipping model '{}' without faces", model.name);
            continue;
        }

        if let Some(&index) = mesh.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(LoadError::InvalidIndex {
                mesh: model.name.clone(),
                index,
                vertex_count,
            });
        }

        let positions: Vec<Vec3> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect();

        let triangles: Vec<Triangle> = mesh
            .indices
            .chunks_exact(3)
            .map(|t| Triangle([t[0], t[1], t[2]]))
            .collect();

        let normals: Vec<Vec3> = if mesh.normals.len() == mesh.positions.len() {
            mesh.normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2]).normalize_or_zero())
                .collect()
        } else {
            log::debug!("Computing smooth normals for '{}'", model.name);
            compute_vertex_normals(&positions, &triangles)
        };

        let has_uvs = mesh.texcoords.len() == vertex_count * 2;

        let vertices: Vec<Vertex> = (0..vertex_count)
            .map(|i| {
                let uv = if has_uvs {
                    Vec2::new(mesh.texcoords[2 * i], mesh.texcoords[2 * i + 1])
                } else {
                    Vec2::ZERO
                };
                Vertex::new(positions[i], normals[i], uv)
            })
            .collect();

        geometry.append(model.name.clone(), &vertices, &triangles);
        log::debug!(
            "Loaded '{}': {} vertices, {} triangles",
            model.name,
            vertices.len(),
            triangles.len()
        );
    }

    if geometry.is_empty() {
        return Err(LoadError::NoGeometry);
    }

    log::info!(
        "Loaded {} submeshes, {} triangles, {} vertices",
        geometry.submesh_count(),
        geometry.triangle_count(),
        geometry.vertex_count()
    );

    Ok(geometry)
}
