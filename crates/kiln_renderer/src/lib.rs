//! Kiln Renderer - progressive tiled ray tracing.
//!
//! A pool of worker threads repeatedly renders tiles of a
//! [`TiledFramebuffer`], each pass adding one sample per pixel. The caller
//! periodically [`TileRenderer::bake`]s the accumulation into a contiguous
//! image. Camera changes invalidate the accumulation and restart it.
//!
//! Shading is done by an [`Integrator`] (ambient occlusion, geometric
//! normals, facing) against a [`SceneView`], which answers ray queries
//! through the [`RayIntersector`] contract.

mod bvh;
mod error;
mod framebuffer;
mod integrator;
mod intersector;
mod ray;
mod scene_view;
mod scheduler;
mod settings;
mod triangle;

pub use bvh::BvhIntersector;
pub use error::{RenderError, RenderResult};
pub use framebuffer::{TileBounds, TileGuard, TiledFramebuffer};
pub use integrator::{
    AmbientOcclusion, FacingDebug, GeometryNormal, Integrator, TileIntegrator, TileParams,
    WorkerScratch,
};
pub use intersector::RayIntersector;
pub use ray::{Coherence, Hit, RayHit, INVALID_ID};
pub use scene_view::{Facing, SceneView, SurfacePoint};
pub use scheduler::{RunState, TileRenderer};
pub use settings::{AoSettings, IntegratorKind, RendererSettings};

/// Re-export math types from kiln_math
pub use kiln_math::{Mat4, Ray, Vec2, Vec3, Vec4};
