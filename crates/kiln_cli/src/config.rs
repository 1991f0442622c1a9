//! Driver configuration (JSON).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_math::{Mat4, Vec3};
use kiln_renderer::RendererSettings;
use serde::{Deserialize, Serialize};

/// Perspective camera orbiting a target point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(6.0, 4.0, 8.0),
            target: Vec3::new(0.0, 0.75, 0.0),
            up: Vec3::Y,
            fov_y: 40.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraConfig {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y.to_radians(), aspect, self.near, self.far)
    }

    /// Rotate the eye around the target's vertical axis.
    pub fn orbit(&mut self, degrees: f32) {
        let rotation = Mat4::from_axis_angle(self.up.normalize_or_zero(), degrees.to_radians());
        self.eye = self.target + rotation.transform_vector3(self.eye - self.target);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// OBJ file to render; the built-in scene when absent
    pub model: Option<PathBuf>,
    pub width: usize,
    pub height: usize,
    pub output: PathBuf,
    /// Number of bake/display iterations
    pub frames: u32,
    /// Sleep between frames, milliseconds
    pub frame_interval_ms: u64,
    /// Camera orbit per frame during the first `orbit_frames` frames
    pub orbit_degrees: f32,
    pub orbit_frames: u32,
    pub camera: CameraConfig,
    pub renderer: RendererSettings,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            model: None,
            width: 640,
            height: 360,
            output: PathBuf::from("kiln.png"),
            frames: 120,
            frame_interval_ms: 16,
            orbit_degrees: 2.0,
            orbit_frames: 10,
            camera: CameraConfig::default(),
            renderer: RendererSettings::default(),
        }
    }
}

impl DriverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}
