//! Headless progressive renderer.
//!
//! Plays the role of an interactive display loop: every frame it applies
//! camera changes, bakes the accumulation and reports progress. The final
//! image is written as PNG.
//!
//! Usage: kiln [config.json]

mod config;
mod output;
mod scene;

use std::env;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use kiln_renderer::{RenderError, SceneView, TileRenderer};

use crate::config::DriverConfig;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => DriverConfig::load(Path::new(path))?,
        None => DriverConfig::default(),
    };

    run(config)
}

fn run(mut config: DriverConfig) -> Result<()> {
    let geometry = match &config.model {
        Some(path) => kiln_core::load_obj(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            log::info!("No model given, using built-in scene");
            scene::demo_scene()
        }
    };

    let start = Instant::now();
    let scene = SceneView::from_geometry(geometry);
    log::info!("Scene ready in {:?}", start.elapsed());

    let mut renderer = TileRenderer::new(config.renderer.clone())?;
    renderer.set_scene(scene);
    renderer.set_framebuffer(config.width, config.height)?;
    renderer.set_projection(config.camera.projection(config.aspect()));
    renderer.set_view(config.camera.view());
    renderer.start()?;

    let interval = Duration::from_millis(config.frame_interval_ms);
    let render_start = Instant::now();

    // Keep the camera still on the last frame
    let orbit_frames = config.orbit_frames.min(config.frames.saturating_sub(1));

    for frame in 0..config.frames {
        if frame < orbit_frames && config.orbit_degrees != 0.0 {
            config.camera.orbit(config.orbit_degrees);
            renderer.set_view(config.camera.view());
        }

        match renderer.bake() {
            Ok(()) => {}
            Err(e @ RenderError::WorkerPanicked { .. }) => log::warn!("{}", e),
            Err(e) => return Err(e.into()),
        }

        if frame % 30 == 0 {
            log::info!(
                "Frame {}: {} samples per tile",
                frame,
                renderer.min_sample_count()
            );
        }
        thread::sleep(interval);
    }

    renderer.pause();
    renderer.bake()?;
    renderer.stop();

    log::info!(
        "Rendered {} frames in {:.2?}, {} samples per tile",
        config.frames,
        render_start.elapsed(),
        renderer.min_sample_count()
    );

    output::save_png(renderer.pixels(), config.width, config.height, &config.output)?;
    println!("Saved {}", config.output.display());
    Ok(())
}
