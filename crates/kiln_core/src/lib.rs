//! Kiln Core - Scene geometry for the progressive renderer.
//!
//! This crate provides:
//!
//! - **Geometry storage**: `SceneGeometry`, a flat vertex/triangle buffer
//!   grouped into submesh ranges
//! - **Model loading**: Wavefront OBJ files via `tobj`
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::load_obj;
//!
//! let geometry = load_obj("sponza.obj")?;
//! println!("Loaded {} submeshes, {} triangles",
//!     geometry.submesh_count(),
//!     geometry.triangle_count());
//! ```

pub mod geometry;
pub mod loader;

// Re-export commonly used types
pub use geometry::{SceneGeometry, SubMesh, Triangle, Vertex};
pub use loader::{load_obj, LoadError, LoadResult};
