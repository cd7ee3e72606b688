use crate::config::{NormalsConfig, NormalsMethod};
use crate::depth::{compute_radius, depth_channel};
use crate::fals::Fals;
use crate::linemod::{DepthSample, Linemod};
use crate::sri::Sri;
use crate::{RgbdError, Result};
use cv_core::{AnyMat, DataType, Float, Mat};
use nalgebra::Matrix3;
use std::time::Instant;

/// One estimator with its per-configuration cache.
#[derive(Debug, Clone)]
pub enum Estimator<T: Float> {
    Fals(Fals<T>),
    Linemod(Linemod<T>),
    Sri(Sri<T>),
}

impl<T: Float> Estimator<T> {
    pub fn build(config: &NormalsConfig) -> Result<Self> {
        Ok(match config.method {
            NormalsMethod::Fals => Estimator::Fals(Fals::new(config)?),
            NormalsMethod::Linemod => Estimator::Linemod(Linemod::new(config)),
            NormalsMethod::Sri => Estimator::Sri(Sri::new(config)?),
        })
    }

    pub fn method(&self) -> NormalsMethod {
        match self {
            Estimator::Fals(_) => NormalsMethod::Fals,
            Estimator::Linemod(_) => NormalsMethod::Linemod,
            Estimator::Sri(_) => NormalsMethod::Sri,
        }
    }
}

/// An [`Estimator`] tagged with its working precision.
#[derive(Debug, Clone)]
pub enum EstimatorCache {
    F32(Estimator<f32>),
    F64(Estimator<f64>),
}

/// Working precisions the facade can dispatch to.
pub trait WorkingPrecision: Float + DepthSample {
    fn select_estimator(cache: &EstimatorCache) -> Option<&Estimator<Self>>;
    fn wrap_estimator(estimator: Estimator<Self>) -> EstimatorCache;
}

impl WorkingPrecision for f32 {
    fn select_estimator(cache: &EstimatorCache) -> Option<&Estimator<Self>> {
        match cache {
            EstimatorCache::F32(e) => Some(e),
            _ => None,
        }
    }
    fn wrap_estimator(estimator: Estimator<Self>) -> EstimatorCache {
        EstimatorCache::F32(estimator)
    }
}

impl WorkingPrecision for f64 {
    fn select_estimator(cache: &EstimatorCache) -> Option<&Estimator<Self>> {
        match cache {
            EstimatorCache::F64(e) => Some(e),
            _ => None,
        }
    }
    fn wrap_estimator(estimator: Estimator<Self>) -> EstimatorCache {
        EstimatorCache::F64(estimator)
    }
}

/// Surface normal estimation for depth maps and organized point clouds.
///
/// The estimator cache is built lazily on the first [`compute`](Self::compute)
/// (or an explicit [`initialize`](Self::initialize)) and rebuilt only when
/// the configuration changes.
///
/// # Example
///
/// ```no_run
/// use cv_core::{AnyMat, CameraIntrinsics, Mat};
/// use cv_rgbd::{NormalsConfig, RgbdNormals};
///
/// let k = CameraIntrinsics::new(525.0, 525.0, 320.0, 240.0).matrix();
/// let mut normals = RgbdNormals::new(NormalsConfig::fast(480, 640, k))?;
///
/// let depth = AnyMat::from(Mat::<u16>::filled(480, 640, 1, 1000));
/// let mut out = AnyMat::default();
/// normals.compute(&depth, &mut out)?;
/// # Ok::<(), cv_rgbd::RgbdError>(())
/// ```
#[derive(Debug)]
pub struct RgbdNormals {
    config: NormalsConfig,
    cache: Option<(NormalsConfig, EstimatorCache)>,
    cache_builds: usize,
}

impl RgbdNormals {
    pub fn new(config: NormalsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: None,
            cache_builds: 0,
        })
    }

    pub fn config(&self) -> &NormalsConfig {
        &self.config
    }

    /// Whether a cache exists for the current configuration.
    pub fn is_initialized(&self) -> bool {
        matches!(&self.cache, Some((cached, _)) if *cached == self.config)
    }

    /// Number of times an estimator cache has been built.
    pub fn cache_builds(&self) -> usize {
        self.cache_builds
    }

    pub fn set_config(&mut self, config: NormalsConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_k(&mut self, k: Matrix3<f64>) -> Result<()> {
        self.set_config(NormalsConfig {
            k,
            ..self.config.clone()
        })
    }

    pub fn set_window_size(&mut self, window_size: usize) -> Result<()> {
        self.set_config(self.config.clone().with_window_size(window_size))
    }

    pub fn set_method(&mut self, method: NormalsMethod) -> Result<()> {
        self.set_config(self.config.clone().with_method(method))
    }

    pub fn set_precision(&mut self, precision: DataType) -> Result<()> {
        self.set_config(self.config.clone().with_precision(precision))
    }

    pub fn set_size(&mut self, rows: usize, cols: usize) -> Result<()> {
        self.set_config(NormalsConfig {
            rows,
            cols,
            ..self.config.clone()
        })
    }

    /// Build the estimator cache unless one already matches the configuration.
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }
        self.config.validate()?;
        self.cache = None;

        let start = Instant::now();
        let cache = match self.config.precision {
            DataType::F32 => f32::wrap_estimator(Estimator::build(&self.config)?),
            DataType::F64 => f64::wrap_estimator(Estimator::build(&self.config)?),
            other => {
                return Err(RgbdError::InvalidConfig(format!(
                    "Working precision must be f32 or f64, got {}",
                    other
                )))
            }
        };
        self.cache_builds += 1;
        tracing::debug!(
            "Built {} normals cache for {}x{} ({}) in {:?}",
            self.config.method,
            self.config.rows,
            self.config.cols,
            self.config.precision,
            start.elapsed()
        );

        self.cache = Some((self.config.clone(), cache));
        Ok(())
    }

    /// Estimate normals for `input` into `output`.
    ///
    /// FALS and SRI take a 3-channel point cloud; LINEMOD additionally takes a
    /// 1-channel `u16`/`f32`/`f64` depth map. `output` is replaced by a
    /// 3-channel grid of the input's size in the working precision. Pixels
    /// an estimator does not reach are NaN.
    pub fn compute(&mut self, input: &AnyMat, output: &mut AnyMat) -> Result<()> {
        self.check_input(input)?;
        match self.config.precision {
            DataType::F32 => self.compute_typed::<f32>(input, output),
            DataType::F64 => self.compute_typed::<f64>(input, output),
            other => Err(RgbdError::InvalidConfig(format!(
                "Working precision must be f32 or f64, got {}",
                other
            ))),
        }
    }

    fn check_input(&self, input: &AnyMat) -> Result<()> {
        let channels = input.channels();
        let data_type = input.data_type();
        let accepted = match self.config.method {
            NormalsMethod::Fals | NormalsMethod::Sri => channels == 3 && data_type.is_float(),
            NormalsMethod::Linemod => (channels == 3 && data_type.is_float()) || channels == 1,
        };
        if !accepted {
            return Err(RgbdError::UnsupportedInput(format!(
                "{} cannot use a {}-channel {} input",
                self.config.method, channels, data_type
            )));
        }

        if !input.is_empty()
            && (input.rows() != self.config.rows || input.cols() != self.config.cols)
        {
            return Err(RgbdError::DimensionMismatch(format!(
                "Input is {}x{} but the estimator is configured for {}x{}",
                input.rows(),
                input.cols(),
                self.config.rows,
                self.config.cols
            )));
        }
        Ok(())
    }

    fn compute_typed<T: WorkingPrecision>(
        &mut self,
        input: &AnyMat,
        output: &mut AnyMat,
    ) -> Result<()> {
        let method = self.config.method;
        if input.data_type() != T::DATA_TYPE
            && (input.channels() == 3 || method != NormalsMethod::Linemod)
        {
            tracing::debug!(
                "Converting {} input to {} working precision",
                input.data_type(),
                T::DATA_TYPE
            );
        }

        let points = if input.channels() == 3 {
            Some(input.to_float::<T>())
        } else {
            None
        };
        let radius = match (&points, method) {
            (Some(p), NormalsMethod::Fals | NormalsMethod::Sri) => Some(compute_radius(p)?),
            _ => None,
        };

        self.initialize()?;

        let mut normals = Mat::<T>::filled(input.rows(), input.cols(), 3, T::nan());
        if input.is_empty() {
            *output = normals.into();
            return Ok(());
        }

        let estimator = self
            .cache
            .as_ref()
            .and_then(|(_, cache)| T::select_estimator(cache))
            .ok_or_else(|| RgbdError::InvalidConfig("Estimator cache precision mismatch".into()))?;
        tracing::trace!("Computing {} normals on {}x{}", method, input.rows(), input.cols());

        match (estimator, radius) {
            (Estimator::Fals(fals), Some(r)) => fals.compute(&r, &mut normals)?,
            (Estimator::Sri(sri), Some(r)) => sri.compute(&r, &mut normals)?,
            (Estimator::Linemod(linemod), _) => match (&points, input) {
                (Some(p), _) => linemod.compute(&depth_channel(p)?, &mut normals)?,
                (None, AnyMat::U16(depth)) => linemod.compute(depth, &mut normals)?,
                (None, AnyMat::F32(depth)) => linemod.compute(depth, &mut normals)?,
                (None, AnyMat::F64(depth)) => linemod.compute(depth, &mut normals)?,
            },
            (other, None) => {
                return Err(RgbdError::UnsupportedInput(format!(
                    "{} needs a 3-channel point cloud",
                    other.method()
                )))
            }
        }

        *output = normals.into();
        Ok(())
    }
}
