// Re-export glam for convenience
pub use glam::*;

// Kiln math types
mod aabb;
mod interval;
mod ray;
mod sampling;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use sampling::{face_forward, orthonormal_basis, sample_hemisphere_cosine};
pub use transform::Mat4Ext;
