use crate::config::NormalsConfig;
use crate::sign::sign_normal_components;
use crate::{RgbdError, Result};
use cv_core::{cast, Element, Float, Mat};
use nalgebra::{Matrix3, Vector3};
use std::marker::PhantomData;

/// Sample half-width and stride of the 3×3 sampling grid.
const RADIUS: usize = 5;
/// Neighbors whose depth differs from the center by more than this are
/// treated as belonging to another surface.
const DIFFERENCE_THRESHOLD: f64 = 50.0;

/// Depth map element readable by LINEMOD.
pub trait DepthSample: Element {
    /// Depth in the map's own units, NaN when the sample has no measurement.
    fn depth_value(self) -> f64;
}

impl DepthSample for u16 {
    #[inline]
    fn depth_value(self) -> f64 {
        if self == 0 {
            f64::NAN
        } else {
            self as f64
        }
    }
}

impl DepthSample for f32 {
    #[inline]
    fn depth_value(self) -> f64 {
        self as f64
    }
}

impl DepthSample for f64 {
    #[inline]
    fn depth_value(self) -> f64 {
        self
    }
}

/// Upper-triangular inverse of a pinhole matrix, written out in closed form.
#[derive(Debug, Clone, Copy)]
struct KInv {
    m00: f64,
    m01: f64,
    m02: f64,
    m11: f64,
    m12: f64,
}

impl KInv {
    fn new(k: &Matrix3<f64>) -> Self {
        let (k00, k01, k02) = (k[(0, 0)], k[(0, 1)], k[(0, 2)]);
        let (k11, k12) = (k[(1, 1)], k[(1, 2)]);
        Self {
            m00: 1.0 / k00,
            m01: -k01 / (k00 * k11),
            m02: (k01 * k12 - k02 * k11) / (k00 * k11),
            m11: 1.0 / k11,
            m12: -k12 / k11,
        }
    }

    #[inline]
    fn mul(&self, a: f64, b: f64, c: f64) -> Vector3<f64> {
        Vector3::new(
            self.m00 * a + self.m01 * b + self.m02 * c,
            self.m11 * b + self.m12 * c,
            c,
        )
    }
}

/// Depth-gradient normals after Hinterstoisser et al. (LINEMOD).
///
/// Holds no precomputed state besides the camera matrix. Only pixels at
/// least 5 px from the top/left and 6 px from the bottom/right edge are
/// written.
#[derive(Debug, Clone)]
pub struct Linemod<T> {
    k: Matrix3<f64>,
    _precision: PhantomData<T>,
}

impl<T: Float> Linemod<T> {
    pub fn new(config: &NormalsConfig) -> Self {
        Self {
            k: config.k,
            _precision: PhantomData,
        }
    }

    pub fn compute<D: DepthSample>(&self, depth: &Mat<D>, normals: &mut Mat<T>) -> Result<()> {
        if depth.channels() != 1 {
            return Err(RgbdError::UnsupportedInput(format!(
                "LINEMOD needs a 1-channel depth map, got {} channels",
                depth.channels()
            )));
        }
        if !depth.same_size(normals) || normals.channels() != 3 {
            return Err(RgbdError::DimensionMismatch(format!(
                "Normals {:?} do not match depth {:?}",
                normals.shape(),
                depth.shape()
            )));
        }

        let rows = depth.rows();
        let cols = depth.cols();
        if rows < 2 * RADIUS + 2 || cols < 2 * RADIUS + 2 {
            return Ok(());
        }

        let k_inv = KInv::new(&self.k);
        let r = RADIUS as isize;
        let offsets: Vec<(isize, isize)> = [-r, 0, r]
            .iter()
            .flat_map(|&j| [-r, 0, r].into_iter().map(move |i| (i, j)))
            .collect();

        for y in RADIUS..rows - RADIUS - 1 {
            for x in RADIUS..cols - RADIUS - 1 {
                let d = depth.at(y, x, 0).depth_value();
                if d.is_nan() {
                    let nan = T::nan();
                    normals.pixel_mut(y, x).copy_from_slice(&[nan, nan, nan]);
                    continue;
                }

                let (mut a0, mut a1, mut a3) = (0i64, 0i64, 0i64);
                let (mut b0, mut b1) = (0.0f64, 0.0f64);
                for &(i, j) in &offsets {
                    let sy = (y as isize + j) as usize;
                    let sx = (x as isize + i) as usize;
                    let delta = depth.at(sy, sx, 0).depth_value() - d;
                    if delta.is_nan() || delta.abs() > DIFFERENCE_THRESHOLD {
                        continue;
                    }
                    a0 += (i * i) as i64;
                    a1 += (i * j) as i64;
                    a3 += (j * j) as i64;
                    b0 += i as f64 * delta;
                    b1 += j as f64 * delta;
                }

                // Gradient left scaled by det; the scale drops out on normalization.
                let det = (a0 * a3 - a1 * a1) as f64;
                let (a0, a1, a3) = (a0 as f64, a1 as f64, a3 as f64);
                let dx = a3 * b0 - a1 * b1;
                let dy = -a1 * b0 + a0 * b1;

                let (xf, yf) = (x as f64, y as f64);
                let x1 = k_inv.mul(d * det + (xf + 1.0) * dx, yf * dx, dx);
                let x2 = k_inv.mul(xf * dy, d * det + (yf + 1.0) * dy, dy);
                let n = x1.cross(&x2);

                let n = sign_normal_components(cast::<T>(n.x), cast(n.y), cast(n.z));
                normals.pixel_mut(y, x).copy_from_slice(n.as_slice());
            }
        }

        Ok(())
    }
}
