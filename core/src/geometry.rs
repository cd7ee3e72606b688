use crate::{Error, Result};
use nalgebra::{Matrix3, Point2, Point3, Vector3};

/// Pinhole intrinsics without skew.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Focal length equal to the image width, principal point at the center.
    pub fn new_ideal(width: u32, height: u32) -> Self {
        let f = width as f64;
        Self::new(f, f, width as f64 / 2.0, height as f64 / 2.0)
    }

    /// Read fx, fy, cx, cy from a calibration matrix. Skew is dropped.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    pub fn project(&self, point: &Point3<f64>) -> Point2<f64> {
        project(&self.matrix(), &point.coords)
    }

    pub fn unproject(&self, pixel: Point2<f64>, depth: f64) -> Point3<f64> {
        Point3::from(back_project(&self.matrix(), pixel.x, pixel.y, depth))
    }
}

/// Build a calibration matrix from a `rows`×`cols` buffer in row-major order.
pub fn intrinsics_from_slice(rows: usize, cols: usize, values: &[f64]) -> Result<Matrix3<f64>> {
    if rows != 3 || cols != 3 {
        return Err(Error::DimensionMismatch(format!(
            "Camera matrix must be 3x3, got {}x{}",
            rows, cols
        )));
    }
    if values.len() != 9 {
        return Err(Error::DimensionMismatch(format!(
            "Camera matrix needs 9 values, got {}",
            values.len()
        )));
    }
    Ok(Matrix3::from_row_slice(values))
}

pub fn validate_intrinsics(k: &Matrix3<f64>) -> Result<()> {
    if k.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(
            "Camera matrix contains non-finite values".into(),
        ));
    }
    if k[(0, 0)] == 0.0 || k[(1, 1)] == 0.0 {
        return Err(Error::InvalidInput(format!(
            "Focal lengths must be nonzero, got fx={} fy={}",
            k[(0, 0)],
            k[(1, 1)]
        )));
    }
    Ok(())
}

/// Back-project pixel (u, v) at `depth` along the optical axis.
///
/// Only fx, fy, cx, cy are read; a skew term in `k` has no effect.
#[inline]
pub fn back_project(k: &Matrix3<f64>, u: f64, v: f64, depth: f64) -> Vector3<f64> {
    let x = (u - k[(0, 2)]) / k[(0, 0)];
    let y = (v - k[(1, 2)]) / k[(1, 1)];
    Vector3::new(x * depth, y * depth, depth)
}

#[inline]
pub fn project(k: &Matrix3<f64>, point: &Vector3<f64>) -> Point2<f64> {
    let x = point.x / point.z;
    let y = point.y / point.z;
    Point2::new(x * k[(0, 0)] + k[(0, 2)], y * k[(1, 1)] + k[(1, 2)])
}
