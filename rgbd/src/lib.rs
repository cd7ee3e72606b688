//! Surface normals from depth images and organized point clouds.
//!
//! Three estimators share one facade, [`RgbdNormals`]:
//!
//! - [`Fals`]: least-squares local plane fit in spherical coordinates.
//! - [`Linemod`]: fast 2×2 depth-gradient fit on the raw depth map.
//! - [`Sri`]: range derivatives on a resampled spherical range image.
//!
//! Normals are unit vectors facing the camera (z ≤ 0). NaN marks pixels
//! without a measurement.

pub mod angles;
pub mod config;
pub mod depth;
pub mod fals;
pub mod linemod;
pub mod normals;
pub mod sign;
pub mod sri;

pub use config::{NormalsConfig, NormalsMethod};
pub use depth::{compute_radius, depth_channel, depth_to_points};
pub use fals::Fals;
pub use linemod::{DepthSample, Linemod};
pub use normals::{Estimator, EstimatorCache, RgbdNormals};
pub use sign::{sign_normal, sign_normal_components};
pub use sri::Sri;

pub type Result<T> = std::result::Result<T, RgbdError>;

#[derive(Debug, thiserror::Error)]
pub enum RgbdError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error(transparent)]
    Core(#[from] cv_core::Error),

    #[error(transparent)]
    Imgproc(#[from] cv_imgproc::ImgprocError),
}
