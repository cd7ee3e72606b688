pub mod convolve;
pub mod geometry;

pub use convolve::*;
pub use geometry::*;

pub type Result<T> = std::result::Result<T, ImgprocError>;

#[derive(Debug, thiserror::Error)]
pub enum ImgprocError {
    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error(transparent)]
    Core(#[from] cv_core::Error),
}
