use crate::angles::compute_theta_phi;
use crate::config::NormalsConfig;
use crate::sign::{sign_normal, sign_normal_components};
use crate::{RgbdError, Result};
use cv_core::{cast, matrix3_to_flat, project, Float, Mat};
use cv_imgproc::{deriv_kernels, remap_bilinear, sep_filter_2d, BorderMode, RemapTable};
use nalgebra::{Matrix3, Vector3};

/// Spherical range image method (Badino et al.).
///
/// The range is resampled onto a grid uniform in (θ, φ), differentiated
/// there with Sobel-family kernels, turned into normals through a per-cell
/// rotation, and resampled back to the image.
#[derive(Debug, Clone)]
pub struct Sri<T: Float> {
    kx_dx: Vec<T>,
    ky_dx: Vec<T>,
    kx_dy: Vec<T>,
    ky_dy: Vec<T>,
    /// Angular grid cell → image pixel.
    forward: RemapTable,
    /// Image pixel → angular grid cell.
    inverse: RemapTable,
    /// Per-cell R_hat, row-major (9 channels).
    r_hat: Mat<T>,
    theta_step: f64,
    phi_step: f64,
}

impl<T: Float> Sri<T> {
    pub fn new(config: &NormalsConfig) -> Result<Self> {
        let (rows, cols) = (config.rows, config.cols);
        if rows < 2 || cols < 2 {
            return Err(RgbdError::InvalidConfig(format!(
                "SRI needs at least 2x2 pixels, got {}x{}",
                rows, cols
            )));
        }
        let k = &config.k;
        let angles = compute_theta_phi(rows, cols, k);

        let (kx_dx, ky_dx) = deriv_kernels(1, 0, config.window_size, true)?;
        let (kx_dy, ky_dy) = deriv_kernels(0, 1, config.window_size, true)?;

        let mid = (cols / 2).saturating_sub(1);
        let min_theta = angles.sin_theta.at(0, 0, 0).asin();
        let max_theta = angles.sin_theta.at(0, cols - 1, 0).asin();
        let min_phi = angles.sin_phi.at(0, mid, 0).asin();
        let max_phi = angles.sin_phi.at(rows - 1, mid, 0).asin();
        let theta_step = (max_theta - min_theta) / (cols - 1) as f64;
        let phi_step = (max_phi - min_phi) / (rows - 1) as f64;

        let mut r_hat = Mat::<T>::new(rows, cols, 9);
        let mut map_x = Vec::with_capacity(rows * cols);
        let mut map_y = Vec::with_capacity(rows * cols);
        for phi_idx in 0..rows {
            let phi = min_phi + phi_idx as f64 * phi_step;
            for theta_idx in 0..cols {
                let theta = min_theta + theta_idx as f64 * theta_step;
                let dir = Vector3::new(theta.sin() * phi.cos(), phi.sin(), theta.cos() * phi.cos());
                let px = project(k, &dir);
                map_x.push(px.x as f32);
                map_y.push(px.y as f32);

                let m = rotation_hat(theta, phi).map(cast::<T>);
                r_hat
                    .pixel_mut(phi_idx, theta_idx)
                    .copy_from_slice(&matrix3_to_flat(&m));
            }
        }
        let forward = RemapTable::new(rows, cols, map_x, map_y)?;

        let (fx, fy) = (k[(0, 0)], k[(1, 1)]);
        let (cx, cy) = (k[(0, 2)], k[(1, 2)]);
        let inverse = RemapTable::from_fn(rows, cols, |i, j| {
            let x = (j as f64 - cx) / fx;
            let y = (i as f64 - cy) / fy;
            let theta = x.atan();
            let phi = (y / (x * x + y * y + 1.0).sqrt()).asin();
            (
                ((theta - min_theta) / theta_step) as f32,
                ((phi - min_phi) / phi_step) as f32,
            )
        });

        // Derivatives are taken on a grid whose spacing is the angular step.
        let to_t = |kernel: &[f64], scale: f64| -> Vec<T> {
            kernel.iter().map(|&v| cast(v / scale)).collect()
        };

        Ok(Self {
            kx_dx: to_t(&kx_dx, theta_step),
            ky_dx: to_t(&ky_dx, 1.0),
            kx_dy: to_t(&kx_dy, 1.0),
            ky_dy: to_t(&ky_dy, phi_step),
            forward,
            inverse,
            r_hat,
            theta_step,
            phi_step,
        })
    }

    pub fn rows(&self) -> usize {
        self.r_hat.rows()
    }

    pub fn cols(&self) -> usize {
        self.r_hat.cols()
    }

    /// Angular spacing of the resampled grid as (θ step, φ step) in radians.
    pub fn angular_steps(&self) -> (f64, f64) {
        (self.theta_step, self.phi_step)
    }

    /// Normals from the per-pixel range `radius` (1 channel).
    pub fn compute(&self, radius: &Mat<T>, normals: &mut Mat<T>) -> Result<()> {
        if radius.channels() != 1 || radius.rows() != self.rows() || radius.cols() != self.cols() {
            return Err(RgbdError::DimensionMismatch(format!(
                "Radius {:?} does not match the {}x{} cache",
                radius.shape(),
                self.rows(),
                self.cols()
            )));
        }
        if !normals.same_size(radius) || normals.channels() != 3 {
            return Err(RgbdError::DimensionMismatch(format!(
                "Normals {:?} do not match radius {:?}",
                normals.shape(),
                radius.shape()
            )));
        }

        let r = remap_bilinear(radius, &self.forward, BorderMode::Constant(0.0));
        let r_theta = sep_filter_2d(&r, &self.kx_dx, &self.ky_dx, BorderMode::Reflect101)?;
        let r_phi = sep_filter_2d(&r, &self.kx_dy, &self.ky_dy, BorderMode::Reflect101)?;

        let mut cell_normals = Mat::<T>::new(self.rows(), self.cols(), 3);
        let cells = cell_normals
            .pixels_mut()
            .zip(self.r_hat.pixels())
            .zip(r.as_slice().iter().zip(r_theta.as_slice()).zip(r_phi.as_slice()));
        for ((out, m), ((&r, &r_t), &r_p)) in cells {
            if r.is_nan() {
                out.copy_from_slice(&[r, r, r]);
                continue;
            }
            let t = r_t / r;
            let p = r_p / r;
            // m[4] (R_hat(1, 1)) is zero.
            let n = sign_normal_components(
                m[0] + m[1] * t + m[2] * p,
                m[3] + m[5] * p,
                m[6] + m[7] * t + m[8] * p,
            );
            out.copy_from_slice(n.as_slice());
        }

        let remapped = remap_bilinear(&cell_normals, &self.inverse, BorderMode::Constant(0.0));
        let pixels = normals
            .pixels_mut()
            .zip(remapped.pixels())
            .zip(radius.as_slice());
        for ((out, n), &r) in pixels {
            if r.is_nan() {
                out.copy_from_slice(&[r, r, r]);
            } else {
                out.copy_from_slice(sign_normal(Vector3::new(n[0], n[1], n[2])).as_slice());
            }
        }

        Ok(())
    }
}

/// P·Rz(θ)·Ry(φ) with column 1 divided by cos φ and column 0 corrected by
/// twice the viewing direction.
fn rotation_hat(theta: f64, phi: f64) -> Matrix3<f64> {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let p = Matrix3::new(0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0);
    let rz = Matrix3::new(ct, -st, 0.0, st, ct, 0.0, 0.0, 0.0, 1.0);
    let ry = Matrix3::new(cp, 0.0, -sp, 0.0, 1.0, 0.0, sp, 0.0, cp);

    let mut m = p * rz * ry;
    for i in 0..3 {
        m[(i, 1)] /= cp;
    }
    m[(0, 0)] -= 2.0 * cp * st;
    m[(1, 0)] -= 2.0 * sp;
    m[(2, 0)] -= 2.0 * cp * ct;
    m
}
