pub mod float;
pub mod geometry;
pub mod image;
pub mod mat;
pub mod runtime;

pub use float::{cast, Float};
pub use geometry::*;
pub use mat::*;
pub use runtime::{current_cpu_threads, init_global_thread_pool, THREADS_ENV};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
}
