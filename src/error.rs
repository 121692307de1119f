/// Error types for chip tiling and remote patch fetching
#[derive(Debug, thiserror::Error)]
pub enum ChipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("cannot derive a chip id from {0}")]
    InvalidChipPath(String),

    #[error("shape mismatch: fetched {fetched:?}, mask {mask:?}")]
    ShapeMismatch {
        fetched: (usize, usize),
        mask: (usize, usize),
    },

    #[error("remote request failed with HTTP {status}: {body}")]
    Remote { status: u16, body: String },
}

/// Result type for chip operations
pub type ChipResult<T> = Result<T, ChipError>;
