use crate::{RgbdError, Result};
use cv_core::{validate_intrinsics, DataType};
use nalgebra::Matrix3;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalsMethod {
    /// Local plane fit in spherical coordinates.
    Fals,
    /// Depth-gradient fit on the raw depth map.
    Linemod,
    /// Derivatives of a spherical range image.
    Sri,
}

impl NormalsMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalsMethod::Fals => "fals",
            NormalsMethod::Linemod => "linemod",
            NormalsMethod::Sri => "sri",
        }
    }
}

impl fmt::Display for NormalsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalsMethod {
    type Err = RgbdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fals" => Ok(NormalsMethod::Fals),
            "linemod" => Ok(NormalsMethod::Linemod),
            "sri" => Ok(NormalsMethod::Sri),
            other => Err(RgbdError::InvalidConfig(format!(
                "Unknown normals method '{}' (expected fals, linemod or sri)",
                other
            ))),
        }
    }
}

pub const WINDOW_SIZES: [usize; 4] = [1, 3, 5, 7];

/// Everything an estimator cache depends on.
///
/// Two configurations are equal only if every field matches, including
/// each entry of `k`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalsConfig {
    pub rows: usize,
    pub cols: usize,
    /// Working precision, `F32` or `F64`.
    pub precision: DataType,
    pub k: Matrix3<f64>,
    pub window_size: usize,
    pub method: NormalsMethod,
}

impl NormalsConfig {
    pub fn new(
        rows: usize,
        cols: usize,
        precision: DataType,
        k: Matrix3<f64>,
        window_size: usize,
        method: NormalsMethod,
    ) -> Self {
        Self {
            rows,
            cols,
            precision,
            k,
            window_size,
            method,
        }
    }

    /// LINEMOD in single precision.
    pub fn fast(rows: usize, cols: usize, k: Matrix3<f64>) -> Self {
        Self::new(rows, cols, DataType::F32, k, 5, NormalsMethod::Linemod)
    }

    /// FALS in double precision.
    pub fn accurate(rows: usize, cols: usize, k: Matrix3<f64>) -> Self {
        Self::new(rows, cols, DataType::F64, k, 5, NormalsMethod::Fals)
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_method(mut self, method: NormalsMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_precision(mut self, precision: DataType) -> Self {
        self.precision = precision;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(RgbdError::InvalidConfig(format!(
                "Image size must be non-zero, got {}x{}",
                self.rows, self.cols
            )));
        }
        if !self.precision.is_float() {
            return Err(RgbdError::InvalidConfig(format!(
                "Working precision must be f32 or f64, got {}",
                self.precision
            )));
        }
        if !WINDOW_SIZES.contains(&self.window_size) {
            return Err(RgbdError::InvalidConfig(format!(
                "Window size must be one of {:?}, got {}",
                WINDOW_SIZES, self.window_size
            )));
        }
        validate_intrinsics(&self.k)
            .map_err(|e| RgbdError::InvalidConfig(format!("Camera matrix: {}", e)))?;
        Ok(())
    }
}
