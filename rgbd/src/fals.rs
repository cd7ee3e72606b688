use crate::angles::compute_theta_phi;
use crate::config::NormalsConfig;
use crate::sign::sign_normal;
use crate::{RgbdError, Result};
use cv_core::{cast, matrix3_from_flat, matrix3_to_flat, Float, Mat};
use cv_imgproc::{box_filter, BorderMode};
use nalgebra::{Matrix3, Vector3};

/// Cholesky pivots at or below this many machine epsilons of the trace are
/// rounding noise of a rank-deficient system.
const PIVOT_TOLERANCE: f64 = 3.0;

/// Fast approximate least squares (Badino et al.).
///
/// The per-pixel 3×3 system only depends on the pixel's viewing direction,
/// so its inverse is computed once per configuration. Each call then needs
/// one box filter and one 3×3 product per pixel.
#[derive(Debug, Clone)]
pub struct Fals<T: Float> {
    window_size: usize,
    /// Unit viewing direction per pixel (3 channels).
    v: Mat<T>,
    /// Inverse of the box-filtered V·Vᵗ per pixel, row-major (9 channels).
    m_inv: Mat<T>,
}

impl<T: Float> Fals<T> {
    pub fn new(config: &NormalsConfig) -> Result<Self> {
        let (rows, cols) = (config.rows, config.cols);
        let angles = compute_theta_phi(rows, cols, &config.k);

        let v = Mat::from_fn(rows, cols, 3, |r, c, ch| {
            let value = match ch {
                0 => angles.sin_theta.at(r, c, 0) * angles.cos_phi.at(r, c, 0),
                1 => angles.sin_phi.at(r, c, 0),
                _ => angles.cos_theta.at(r, c, 0) * angles.cos_phi.at(r, c, 0),
            };
            cast::<T>(value)
        });

        let mut m = Mat::<T>::new(rows, cols, 9);
        for (dir, out) in v.pixels().zip(m.pixels_mut()) {
            let d = Vector3::new(dir[0], dir[1], dir[2]);
            out.copy_from_slice(&matrix3_to_flat(&(d * d.transpose())));
        }
        let m = box_filter(&m, config.window_size, false, BorderMode::Reflect101)?;

        let mut m_inv = Mat::<T>::new(rows, cols, 9);
        for (src, out) in m.pixels().zip(m_inv.pixels_mut()) {
            out.copy_from_slice(&matrix3_to_flat(&invert_semidefinite(matrix3_from_flat(src))));
        }

        Ok(Self {
            window_size: config.window_size,
            v,
            m_inv,
        })
    }

    pub fn rows(&self) -> usize {
        self.v.rows()
    }

    pub fn cols(&self) -> usize {
        self.v.cols()
    }

    /// Normals from the per-pixel range `radius` (1 channel).
    ///
    /// Pixels whose range is NaN receive that NaN in all three channels and
    /// do not contribute to their neighbors.
    pub fn compute(&self, radius: &Mat<T>, normals: &mut Mat<T>) -> Result<()> {
        if radius.channels() != 1 || !radius.same_size(&self.v) {
            return Err(RgbdError::DimensionMismatch(format!(
                "Radius {:?} does not match the {}x{} cache",
                radius.shape(),
                self.rows(),
                self.cols()
            )));
        }
        if !normals.same_size(&self.v) || normals.channels() != 3 {
            return Err(RgbdError::DimensionMismatch(format!(
                "Normals {:?} do not match the {}x{} cache",
                normals.shape(),
                self.rows(),
                self.cols()
            )));
        }

        let mut b = Mat::<T>::new(self.rows(), self.cols(), 3);
        for ((out, dir), &r) in b.pixels_mut().zip(self.v.pixels()).zip(radius.as_slice()) {
            if !r.is_nan() {
                for (o, &d) in out.iter_mut().zip(dir) {
                    *o = d / r;
                }
            }
        }
        let b = box_filter(&b, self.window_size, false, BorderMode::Reflect101)?;

        let zipped = normals
            .pixels_mut()
            .zip(b.pixels())
            .zip(self.m_inv.pixels())
            .zip(radius.as_slice());
        for (((out, bv), m_inv), &r) in zipped {
            if r.is_nan() {
                out.copy_from_slice(&[r, r, r]);
                continue;
            }
            let n = matrix3_from_flat(m_inv) * Vector3::new(bv[0], bv[1], bv[2]);
            out.copy_from_slice(sign_normal(n).as_slice());
        }

        Ok(())
    }
}

/// Invert a symmetric positive semi-definite matrix, zero if singular.
///
/// A zero inverse turns the pixel's normal into NaN.
fn invert_semidefinite<T: Float>(m: Matrix3<T>) -> Matrix3<T> {
    let tolerance = cast::<T>(PIVOT_TOLERANCE) * T::default_epsilon() * m.trace();
    match m.cholesky() {
        Some(chol) if chol.l_dirty().diagonal().iter().all(|&l| l * l > tolerance) => {
            chol.inverse()
        }
        _ => Matrix3::zeros(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalsMethod;
    use approx::assert_relative_eq;
    use cv_core::{CameraIntrinsics, DataType, Element};

    fn config(rows: usize, cols: usize) -> NormalsConfig {
        let k = CameraIntrinsics::new(300.0, 300.0, cols as f64 / 2.0, rows as f64 / 2.0).matrix();
        NormalsConfig::new(rows, cols, DataType::F64, k, 5, NormalsMethod::Fals)
    }

    #[test]
    fn direction_field_is_unit() {
        let fals = Fals::<f64>::new(&config(12, 16)).unwrap();
        for dir in fals.v.pixels() {
            let n = Vector3::new(dir[0], dir[1], dir[2]).norm();
            assert_relative_eq!(n, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn singular_matrix_inverts_to_zero() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(invert_semidefinite(m), Matrix3::zeros());
        let spd = Matrix3::new(4.0, 1.0, 0.0, 1.0, 3.0, 0.0, 0.0, 0.0, 2.0);
        assert_relative_eq!(invert_semidefinite(spd) * spd, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn rounded_rank_one_matrix_inverts_to_zero() {
        for (x, y) in [(0.0107, -0.0093), (0.31, 0.2), (-0.45, 0.05), (0.003, 0.4)] {
            let d = Vector3::new(x, y, 1.0f64).normalize();
            assert_eq!(invert_semidefinite(d * d.transpose()), Matrix3::zeros());
            let d = d.map(|v| v as f32);
            assert_eq!(invert_semidefinite(d * d.transpose()), Matrix3::zeros());
        }
    }

    fn check_window_one<T: Float>() {
        let fals = Fals::<T>::new(&config(12, 16).with_window_size(1)).unwrap();
        let radius = Mat::filled(12, 16, 1, cast::<T>(1000.0));
        let mut normals = Mat::new(12, 16, 3);
        fals.compute(&radius, &mut normals).unwrap();

        // On a sphere around the camera the normal is the reversed view ray.
        let min_cos = 1.0f64.to_radians().cos();
        for (n, dir) in normals.pixels().zip(fals.v.pixels()) {
            if n.iter().any(|v| v.is_nan()) {
                continue;
            }
            let n = Vector3::new(n[0].as_f64(), n[1].as_f64(), n[2].as_f64());
            let d = Vector3::new(dir[0].as_f64(), dir[1].as_f64(), dir[2].as_f64());
            assert!(-n.normalize().dot(&d.normalize()) > min_cos, "{:?}", n);
        }
    }

    #[test]
    fn window_one_never_yields_a_wrong_normal() {
        check_window_one::<f64>();
        check_window_one::<f32>();
    }

    #[test]
    fn nan_radius_is_copied() {
        let fals = Fals::<f64>::new(&config(12, 16)).unwrap();
        let mut radius = Mat::filled(12, 16, 1, 2.0);
        radius.set(6, 7, 0, f64::NAN);
        let mut normals = Mat::new(12, 16, 3);
        fals.compute(&radius, &mut normals).unwrap();
        assert!(normals.pixel(6, 7).iter().all(|v| v.is_nan()));
        assert!(normals.pixel(6, 8).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let fals = Fals::<f32>::new(&config(12, 16)).unwrap();
        let radius = Mat::filled(12, 15, 1, 2.0f32);
        let mut normals = Mat::new(12, 15, 3);
        assert!(fals.compute(&radius, &mut normals).is_err());
    }
}
