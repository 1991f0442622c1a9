//! Progressive tile scheduler.
//!
//! A fixed pool of worker threads pulls tiles from a shuffled, endlessly
//! repeating visitation order and adds one sample per pass. The caller
//! drives it from its own loop: move the camera, [`TileRenderer::bake`],
//! display [`TileRenderer::pixels`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use kiln_math::{Mat4, Vec4};
use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{RenderError, RenderResult};
use crate::framebuffer::TiledFramebuffer;
use crate::integrator::{Integrator, TileParams, WorkerScratch};
use crate::scene_view::SceneView;
use crate::settings::RendererSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No worker threads
    Stopped,
    Running,
    /// Workers alive but parked between tiles
    Paused,
}

/// Accumulation buffers and tile order shared with the workers.
/// Rebuilt when the framebuffer size changes.
struct RenderTarget {
    framebuffer: TiledFramebuffer,
    permutation: Vec<usize>,
    sample_counts: Vec<AtomicU32>,
    cursor: AtomicUsize,
}

impl RenderTarget {
    fn new(tile_size: usize, width: usize, height: usize, shuffle_seed: u64) -> Self {
        let framebuffer = TiledFramebuffer::new(tile_size, width, height);
        let tile_count = framebuffer.tile_count();

        let mut permutation: Vec<usize> = (0..tile_count).collect();
        permutation.shuffle(&mut StdRng::seed_from_u64(shuffle_seed));

        Self {
            framebuffer,
            permutation,
            sample_counts: (0..tile_count).map(|_| AtomicU32::new(0)).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    fn next_tile(&self) -> usize {
        let n = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.permutation[n % self.permutation.len()]
    }

    /// Render one more sample into the next tile in visitation order.
    fn render_next(&self, integrator: &Integrator, scratch: &mut WorkerScratch) {
        let tile_id = self.next_tile();
        let mut cells = self.framebuffer.lock_tile(tile_id);

        // Only touched while the tile is locked
        let sample_index = self.sample_counts[tile_id].load(Ordering::Relaxed);
        let params = TileParams {
            tile_id,
            sample_index,
            bounds: self.framebuffer.tile_bounds(tile_id),
            tile_size: self.framebuffer.tile_size(),
        };
        if integrator.render_tile(&params, scratch, &mut cells[..]) {
            self.sample_counts[tile_id].store(sample_index + 1, Ordering::Relaxed);
        }
    }

    /// Zero the accumulation and restart the visitation order. Workers must
    /// be parked or stopped.
    fn reset(&self) {
        self.framebuffer.clear();
        for count in &self.sample_counts {
            count.store(0, Ordering::Relaxed);
        }
        self.cursor.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct ControlState {
    pause: bool,
    stop: bool,
    /// Workers blocked in `wait_turn`
    parked: usize,
    /// Workers that have not exited
    live: usize,
    panicked: usize,
}

/// Pause/stop flags and the barrier the pausing thread waits on.
#[derive(Default)]
struct Control {
    state: Mutex<ControlState>,
    condvar: Condvar,
}

impl Control {
    /// Called by a worker between tiles. Parks while paused; returns false
    /// once the worker should exit.
    fn wait_turn(&self) -> bool {
        let mut state = self.state.lock();
        if state.pause && !state.stop {
            state.parked += 1;
            self.condvar.notify_all();
            while state.pause && !state.stop {
                self.condvar.wait(&mut state);
            }
            state.parked -= 1;
        }
        !state.stop
    }

    /// Block until every live worker is parked.
    fn pause(&self) {
        let mut state = self.state.lock();
        state.pause = true;
        while state.parked < state.live {
            self.condvar.wait(&mut state);
        }
    }

    fn resume(&self) {
        self.state.lock().pause = false;
        self.condvar.notify_all();
    }

    fn request_stop(&self) {
        self.state.lock().stop = true;
        self.condvar.notify_all();
    }

    fn reset(&self) {
        *self.state.lock() = ControlState::default();
    }

    fn worker_spawned(&self) {
        self.state.lock().live += 1;
    }

    fn worker_panicked(&self) {
        let mut state = self.state.lock();
        state.live -= 1;
        state.panicked += 1;
        self.condvar.notify_all();
    }

    fn panicked(&self) -> usize {
        self.state.lock().panicked
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

fn worker_main(
    id: usize,
    integrator: Arc<Integrator>,
    target: Arc<RenderTarget>,
    control: Arc<Control>,
) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut scratch = integrator.create_scratch();
        let mut tiles = 0u64;
        while control.wait_turn() {
            target.render_next(&integrator, &mut scratch);
            tiles += 1;
        }
        tiles
    }));

    match result {
        Ok(tiles) => log::debug!("Worker {} exiting after {} tiles", id, tiles),
        Err(payload) => {
            log::error!("Worker {} panicked: {}", id, panic_message(payload.as_ref()));
            control.worker_panicked();
        }
    }
}

/// Progressive multi-threaded tile renderer.
///
/// Camera and scene changes mark the accumulation dirty; the next
/// [`bake`](Self::bake) discards it and restarts sampling.
pub struct TileRenderer {
    settings: RendererSettings,
    integrator: Arc<Integrator>,
    target: Arc<RenderTarget>,
    control: Arc<Control>,
    workers: Vec<JoinHandle<()>>,
    state: RunState,
    dirty: bool,
    image: Vec<Vec4>,
}

impl TileRenderer {
    pub fn new(settings: RendererSettings) -> RenderResult<Self> {
        let integrator = Integrator::from_settings(&settings);
        Self::with_integrator(settings, integrator)
    }

    /// Use a preconfigured integrator. Its tile size is overridden by
    /// `settings.tile_size`.
    pub fn with_integrator(settings: RendererSettings, integrator: Integrator) -> RenderResult<Self> {
        if settings.tile_size == 0 {
            return Err(RenderError::InvalidTileSize(0));
        }
        integrator.set_tile_size(settings.tile_size);
        let target = RenderTarget::new(settings.tile_size, 0, 0, settings.shuffle_seed);

        Ok(Self {
            settings,
            integrator: Arc::new(integrator),
            target: Arc::new(target),
            control: Arc::new(Control::default()),
            workers: Vec::new(),
            state: RunState::Stopped,
            dirty: true,
            image: Vec::new(),
        })
    }

    pub fn set_scene(&mut self, scene: SceneView) {
        self.integrator.set_scene(scene);
        self.dirty = true;
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.integrator.set_projection(projection);
        self.dirty = true;
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.integrator.set_view(view);
        self.dirty = true;
    }

    /// Resize the framebuffer. A running or paused pool is stopped, rebuilt
    /// and restarted in the Running state.
    pub fn set_framebuffer(&mut self, width: usize, height: usize) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidFramebuffer { width, height });
        }

        let restart = self.state != RunState::Stopped;
        self.stop();

        self.target = Arc::new(RenderTarget::new(
            self.settings.tile_size,
            width,
            height,
            self.settings.shuffle_seed,
        ));
        self.integrator.set_framebuffer_size(width, height);
        self.image = vec![Vec4::ZERO; width * height];
        self.dirty = true;
        log::info!(
            "Framebuffer {}x{} ({} tiles of {}px)",
            width,
            height,
            self.target.framebuffer.tile_count(),
            self.settings.tile_size
        );

        if restart {
            self.start()?;
        }
        Ok(())
    }

    /// Start or resume rendering. Returns `Ok(false)` if already running.
    pub fn start(&mut self) -> RenderResult<bool> {
        match self.state {
            RunState::Running => return Ok(false),
            RunState::Paused => {
                self.control.resume();
                self.state = RunState::Running;
                log::debug!("Resumed {} workers", self.workers.len());
                return Ok(true);
            }
            RunState::Stopped => {}
        }

        self.integrator.preprocess()?;
        if self.dirty {
            self.clear();
        }
        self.control.reset();

        let count = self.settings.resolved_worker_count();
        for id in 0..count {
            let integrator = Arc::clone(&self.integrator);
            let target = Arc::clone(&self.target);
            let control = Arc::clone(&self.control);

            let spawned = thread::Builder::new()
                .name(format!("kiln-worker-{}", id))
                .spawn(move || worker_main(id, integrator, target, control));

            match spawned {
                Ok(handle) => {
                    self.control.worker_spawned();
                    self.workers.push(handle);
                }
                Err(e) => {
                    log::error!("Failed to spawn render worker {}: {}", id, e);
                    self.stop();
                    return Err(RenderError::WorkerSpawn(e));
                }
            }
        }

        self.state = RunState::Running;
        log::info!(
            "Started {} render workers ({})",
            count,
            self.integrator.name()
        );
        Ok(true)
    }

    /// Park all workers between tiles. Returns false if not running.
    pub fn pause(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        self.control.pause();
        self.state = RunState::Paused;
        log::debug!("Paused {} workers", self.workers.len());
        true
    }

    /// Stop and join all workers. Idempotent.
    pub fn stop(&mut self) {
        if !self.workers.is_empty() {
            self.control.request_stop();
            for handle in self.workers.drain(..) {
                let name = handle.thread().name().unwrap_or("kiln-worker").to_string();
                if handle.join().is_err() {
                    log::error!("Render worker '{}' terminated abnormally", name);
                }
            }
            log::info!("Stopped render workers");
        }
        self.state = RunState::Stopped;
    }

    /// Refresh [`pixels`](Self::pixels).
    ///
    /// A dirty accumulation is cleared instead (and sampling restarted if
    /// running), leaving an all-zero image. Reports
    /// [`RenderError::WorkerPanicked`] while any worker has died; the image
    /// is still updated.
    pub fn bake(&mut self) -> RenderResult<()> {
        if self.dirty {
            match self.state {
                RunState::Stopped | RunState::Paused => self.clear(),
                RunState::Running => {
                    self.pause();
                    self.clear();
                    self.start()?;
                    log::debug!("Accumulation restarted");
                }
            }
        } else {
            self.target.framebuffer.copy_to(&mut self.image);
        }

        match self.control.panicked() {
            0 => Ok(()),
            count => Err(RenderError::WorkerPanicked { count }),
        }
    }

    fn clear(&mut self) {
        self.target.reset();
        self.image.fill(Vec4::ZERO);
        self.dirty = false;
    }

    /// Last baked image, row-major `width * height`, RGB sums with the
    /// sample weight in alpha.
    pub fn pixels(&self) -> &[Vec4] {
        &self.image
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// The shading front end, read-only. Configuration changes go through
    /// the renderer's setters so the accumulation is marked dirty:
    ///
    /// ```compile_fail
    /// use kiln_renderer::{Mat4, RendererSettings, TileRenderer};
    ///
    /// let renderer = TileRenderer::new(RendererSettings::default()).unwrap();
    /// renderer.integrator().set_view(Mat4::IDENTITY);
    /// ```
    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    pub fn framebuffer_size(&self) -> (usize, usize) {
        (self.target.framebuffer.width(), self.target.framebuffer.height())
    }

    pub fn tile_count(&self) -> usize {
        self.target.framebuffer.tile_count()
    }

    /// Completed passes per tile.
    pub fn sample_counts(&self) -> Vec<u32> {
        self.target
            .sample_counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Passes completed by every tile; zero without tiles.
    pub fn min_sample_count(&self) -> u32 {
        self.target
            .sample_counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .min()
            .unwrap_or(0)
    }
}

impl Drop for TileRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}
