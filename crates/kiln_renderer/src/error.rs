use thiserror::Error;

/// Errors reported by the tile renderer and integrator setup.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No scene set")]
    SceneNotSet,

    #[error("Invalid framebuffer size {width}x{height}")]
    InvalidFramebuffer { width: usize, height: usize },

    #[error("Invalid tile size {0}")]
    InvalidTileSize(usize),

    #[error("Failed to spawn render worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("{count} render worker(s) panicked")]
    WorkerPanicked { count: usize },
}

pub type RenderResult<T> = Result<T, RenderError>;
