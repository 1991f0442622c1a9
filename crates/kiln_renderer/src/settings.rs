//! Renderer configuration, loadable from JSON.

use serde::{Deserialize, Serialize};

/// Shading algorithm run for every pixel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    /// Visible fraction of the cosine-weighted hemisphere
    #[default]
    AmbientOcclusion,
    /// Absolute value of the triangle normal
    GeometryNormal,
    /// Magenta for front faces, green for back faces
    Facing,
}

/// Ambient occlusion parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AoSettings {
    /// Occlusion rays per hit are `sqrt_sample_count²`, stratified
    pub sqrt_sample_count: u32,
    /// Offset of occlusion ray origins along the normal
    pub epsilon: f32,
    /// Occluders farther than this are ignored
    pub max_distance: f32,
}

impl AoSettings {
    pub fn ray_count(&self) -> usize {
        (self.sqrt_sample_count as usize).pow(2)
    }
}

impl Default for AoSettings {
    fn default() -> Self {
        Self {
            sqrt_sample_count: 4,
            epsilon: 0.01,
            max_distance: 100.0,
        }
    }
}

/// Tile renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub tile_size: usize,
    /// `None` picks one less than the available parallelism (at least 1)
    pub worker_count: Option<usize>,
    /// Seed of the tile visitation shuffle
    pub shuffle_seed: u64,
    pub integrator: IntegratorKind,
    pub ambient_occlusion: AoSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            tile_size: 16,
            worker_count: None,
            shuffle_seed: 0x6b69_6c6e,
            integrator: IntegratorKind::default(),
            ambient_occlusion: AoSettings::default(),
        }
    }
}

impl RendererSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Number of worker threads `start()` spawns.
    pub fn resolved_worker_count(&self) -> usize {
        let count = self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
                .saturating_sub(1)
        });
        count.max(1)
    }
}
