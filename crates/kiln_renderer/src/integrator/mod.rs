//! Per-pixel shading of tiles.
//!
//! [`Integrator`] owns the camera and framebuffer configuration, per-tile
//! random seeds and primary ray generation. The shading itself is done by a
//! [`TileIntegrator`] chosen through [`IntegratorKind`].

mod ambient_occlusion;
mod facing;
mod geometry_normal;

use std::sync::atomic::{AtomicBool, Ordering};

use kiln_math::{Mat4, Mat4Ext, Ray, Vec2, Vec4};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{RenderError, RenderResult};
use crate::framebuffer::TileBounds;
use crate::ray::{Coherence, RayHit};
use crate::scene_view::{SceneView, SurfacePoint};
use crate::settings::{AoSettings, IntegratorKind, RendererSettings};

pub use ambient_occlusion::AmbientOcclusion;
pub use facing::FacingDebug;
pub use geometry_normal::GeometryNormal;

/// Seed spacing between consecutive tiles.
const TILE_SEED_STRIDE: u64 = 1024;

/// One tile render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileParams {
    pub tile_id: usize,
    /// Number of passes already accumulated into this tile
    pub sample_index: u32,
    pub bounds: TileBounds,
    /// Tile stride of the framebuffer the cells belong to
    pub tile_size: usize,
}

/// Ray buffers reused by one worker across tiles.
///
/// Sized for a full tile up front so rendering does not allocate.
#[derive(Debug, Default)]
pub struct WorkerScratch {
    pub primary: Vec<RayHit>,
    /// Tile cell index of each entry in `primary`
    pub slots: Vec<usize>,
    pub occlusion_rays: Vec<Ray>,
    pub occluded: Vec<bool>,
    /// Tile cell index owning each group of occlusion rays
    pub owners: Vec<usize>,
}

impl WorkerScratch {
    pub fn new(tile_pixel_count: usize, rays_per_hit: usize) -> Self {
        let secondary = tile_pixel_count * rays_per_hit;
        Self {
            primary: Vec::with_capacity(tile_pixel_count),
            slots: Vec::with_capacity(tile_pixel_count),
            occlusion_rays: Vec::with_capacity(secondary),
            occluded: Vec::with_capacity(secondary),
            owners: Vec::with_capacity(tile_pixel_count),
        }
    }

    fn begin_tile(&mut self) {
        self.primary.clear();
        self.slots.clear();
        self.occlusion_rays.clear();
        self.occluded.clear();
        self.owners.clear();
    }
}

/// Shading algorithm applied to a tile's primary hits.
pub trait TileIntegrator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Secondary rays traced per primary hit.
    fn rays_per_hit(&self) -> usize {
        0
    }

    /// Shade `scratch.primary` (already intersected) and accumulate one
    /// sample into `cells[scratch.slots[i]]` for every primary ray.
    fn shade_tile(
        &self,
        scene: &SceneView,
        rng: &mut StdRng,
        scratch: &mut WorkerScratch,
        cells: &mut [Vec4],
    );
}

impl IntegratorKind {
    pub fn build(self, ao: &AoSettings) -> Box<dyn TileIntegrator> {
        match self {
            IntegratorKind::AmbientOcclusion => Box::new(AmbientOcclusion::new(ao.clone())),
            IntegratorKind::GeometryNormal => Box::new(GeometryNormal),
            IntegratorKind::Facing => Box::new(FacingDebug),
        }
    }
}

static UNRESOLVED_HIT_REPORTED: AtomicBool = AtomicBool::new(false);

/// Surface at a primary hit, or `None` for a miss. A hit the scene cannot
/// resolve is treated as a miss.
pub(crate) fn resolve_hit(scene: &SceneView, rayhit: &RayHit) -> Option<SurfacePoint> {
    if !rayhit.is_hit() {
        return None;
    }

    let surface = scene.eval_hit_point(rayhit);
    if surface.is_none() && !UNRESOLVED_HIT_REPORTED.swap(true, Ordering::Relaxed) {
        log::warn!(
            "Intersector reported submesh {} triangle {} (u={}, v={}) which does not resolve; \
             treating as a miss",
            rayhit.hit.submesh_id,
            rayhit.hit.triangle_id,
            rayhit.hit.u,
            rayhit.hit.v
        );
    }
    surface
}

struct Config {
    scene: Option<SceneView>,
    inv_view: Mat4,
    inv_projection: Mat4,
    width: usize,
    height: usize,
    tile_size: usize,
    tile_count_x: usize,
    tile_count_y: usize,
    tile_seeds: Vec<u64>,
}

impl Config {
    /// Camera ray through a raster position (pixel units, origin at the
    /// first row, which maps to NDC y = -1).
    fn primary_ray(&self, raster: Vec2) -> Ray {
        let size = Vec2::new(self.width as f32, self.height as f32);
        let ndc = Vec2::splat(-1.0) + 2.0 * raster / size;

        let view_pos = self.inv_projection.unproject_ndc(ndc);
        let world_pos = self.inv_view.project_point3(view_pos);
        let origin = self.inv_view.translation();

        Ray::new(origin, (world_pos - origin).normalize_or_zero())
    }
}

/// Integrator front end shared by all render workers.
///
/// Configured only through [`TileRenderer`](crate::TileRenderer), which marks
/// the accumulation dirty on every change. A tile render reads one
/// consistent configuration.
pub struct Integrator {
    variant: Box<dyn TileIntegrator>,
    config: RwLock<Config>,
}

impl Integrator {
    pub fn new(kind: IntegratorKind, ao: &AoSettings) -> Self {
        Self::with_tile_integrator(kind.build(ao))
    }

    pub fn from_settings(settings: &RendererSettings) -> Self {
        let integrator = Self::new(settings.integrator, &settings.ambient_occlusion);
        integrator.set_tile_size(settings.tile_size);
        integrator
    }

    /// Use a custom shading algorithm.
    pub fn with_tile_integrator(variant: Box<dyn TileIntegrator>) -> Self {
        Self {
            variant,
            config: RwLock::new(Config {
                scene: None,
                inv_view: Mat4::IDENTITY,
                inv_projection: Mat4::IDENTITY,
                width: 0,
                height: 0,
                tile_size: 16,
                tile_count_x: 0,
                tile_count_y: 0,
                tile_seeds: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.variant.name()
    }

    pub(crate) fn set_scene(&self, scene: SceneView) {
        self.config.write().scene = Some(scene);
    }

    pub fn scene(&self) -> Option<SceneView> {
        self.config.read().scene.clone()
    }

    pub fn has_scene(&self) -> bool {
        self.config.read().scene.is_some()
    }

    /// Set the camera-to-clip projection. The inverse is stored.
    pub(crate) fn set_projection(&self, projection: Mat4) {
        self.config.write().inv_projection = projection.inverse();
    }

    /// Set the world-to-camera transform. The inverse is stored.
    pub(crate) fn set_view(&self, view: Mat4) {
        self.config.write().inv_view = view.inverse();
    }

    pub(crate) fn set_framebuffer_size(&self, width: usize, height: usize) {
        let mut config = self.config.write();
        config.width = width;
        config.height = height;
    }

    pub(crate) fn set_tile_size(&self, tile_size: usize) {
        self.config.write().tile_size = tile_size;
    }

    pub fn tile_size(&self) -> usize {
        self.config.read().tile_size
    }

    /// Validate the configuration and derive tile counts and seeds. Call
    /// after the setters and before the first [`render_tile`](Self::render_tile).
    pub(crate) fn preprocess(&self) -> RenderResult<()> {
        let mut config = self.config.write();

        if config.scene.is_none() {
            return Err(RenderError::SceneNotSet);
        }
        if config.tile_size == 0 {
            return Err(RenderError::InvalidTileSize(config.tile_size));
        }
        if config.width == 0 || config.height == 0 {
            return Err(RenderError::InvalidFramebuffer {
                width: config.width,
                height: config.height,
            });
        }

        config.tile_count_x = config.width.div_ceil(config.tile_size);
        config.tile_count_y = config.height.div_ceil(config.tile_size);
        let tile_count = config.tile_count_x * config.tile_count_y;
        config.tile_seeds = (0..tile_count as u64)
            .map(|tile| tile * TILE_SEED_STRIDE)
            .collect();

        log::debug!(
            "Integrator '{}' ready: {}x{}, {} tiles of {}px",
            self.variant.name(),
            config.width,
            config.height,
            tile_count,
            config.tile_size
        );
        Ok(())
    }

    /// Scratch buffers for one worker, sized for the current tile size.
    pub(crate) fn create_scratch(&self) -> WorkerScratch {
        let tile_size = self.config.read().tile_size;
        WorkerScratch::new(tile_size * tile_size, self.variant.rays_per_hit())
    }

    /// Camera ray through a raster position.
    pub fn primary_ray(&self, raster: Vec2) -> Ray {
        self.config.read().primary_ray(raster)
    }

    /// Add one sample to every valid pixel of a tile.
    ///
    /// Randomness is drawn from a stream seeded by (tile, sample index), so
    /// the result does not depend on which worker renders the tile.
    ///
    /// Returns false, leaving `cells` untouched, when the tile does not
    /// match the preprocessed configuration.
    pub fn render_tile(
        &self,
        params: &TileParams,
        scratch: &mut WorkerScratch,
        cells: &mut [Vec4],
    ) -> bool {
        let config = self.config.read();
        let Some(scene) = config.scene.as_ref() else {
            log::warn!("Tile {} rendered without a scene", params.tile_id);
            return false;
        };

        let bounds = params.bounds;
        let tile_size = config.tile_size;
        if params.tile_size != tile_size
            || cells.len() < tile_size * tile_size
            || bounds.count_x > tile_size
            || bounds.count_y > tile_size
        {
            log::error!(
                "Tile {} laid out for {}px tiles ({} cells), integrator uses {}px; skipped",
                params.tile_id,
                params.tile_size,
                cells.len(),
                tile_size
            );
            return false;
        }
        let Some(&tile_seed) = config.tile_seeds.get(params.tile_id) else {
            log::error!(
                "Tile {} out of range ({} tiles); skipped",
                params.tile_id,
                config.tile_seeds.len()
            );
            return false;
        };

        let mut rng = sample_rng(tile_seed, params.sample_index);

        scratch.begin_tile();
        for py in 0..bounds.count_y {
            for px in 0..bounds.count_x {
                let jitter = Vec2::new(rng.gen(), rng.gen());
                let raster =
                    Vec2::new((bounds.begin_x + px) as f32, (bounds.begin_y + py) as f32) + jitter;

                scratch.primary.push(RayHit::new(config.primary_ray(raster)));
                scratch.slots.push(py * tile_size + px);
            }
        }

        scene.intersect_batch(&mut scratch.primary, Coherence::Coherent);
        self.variant.shade_tile(scene, &mut rng, scratch, cells);
        true
    }
}

/// Random stream for one pass over one tile. Distinct (tile seed, sample)
/// pairs always give distinct generator seeds.
fn sample_rng(tile_seed: u64, sample_index: u32) -> StdRng {
    let mut seed = <StdRng as SeedableRng>::Seed::default();
    seed[..8].copy_from_slice(&tile_seed.to_le_bytes());
    seed[8..12].copy_from_slice(&sample_index.to_le_bytes());
    StdRng::from_seed(seed)
}
