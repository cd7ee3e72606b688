//! Conversions between depth maps, organized point clouds and range images.

use crate::linemod::DepthSample;
use crate::{RgbdError, Result};
use cv_core::{back_project, cast, Float, Mat};
use nalgebra::Matrix3;
use rayon::prelude::*;

/// Back-project a depth map into an organized point cloud (3 channels).
///
/// Depth keeps its own units. Pixels without a measurement (NaN, or 0 for
/// `u16`) become a NaN triple.
pub fn depth_to_points<D: DepthSample, T: Float>(
    depth: &Mat<D>,
    k: &Matrix3<f64>,
) -> Result<Mat<T>> {
    if depth.channels() != 1 {
        return Err(RgbdError::UnsupportedInput(format!(
            "Depth map needs 1 channel, got {}",
            depth.channels()
        )));
    }
    let cols = depth.cols();
    let mut points = Mat::<T>::new(depth.rows(), cols, 3);
    if depth.is_empty() {
        return Ok(points);
    }

    points
        .as_mut_slice()
        .par_chunks_mut(cols * 3)
        .zip(depth.as_slice().par_chunks(cols))
        .enumerate()
        .for_each(|(y, (row_out, row_in))| {
            for (x, (out, &d)) in row_out.chunks_exact_mut(3).zip(row_in).enumerate() {
                let z = d.depth_value();
                if z.is_nan() {
                    out.copy_from_slice(&[T::nan(); 3]);
                } else {
                    let p = back_project(k, x as f64, y as f64, z);
                    out.copy_from_slice(&[cast(p.x), cast(p.y), cast(p.z)]);
                }
            }
        });

    Ok(points)
}

/// Euclidean distance of every point from the camera center (1 channel).
///
/// NaN in any coordinate yields NaN.
pub fn compute_radius<T: Float>(points: &Mat<T>) -> Result<Mat<T>> {
    if points.channels() != 3 {
        return Err(RgbdError::UnsupportedInput(format!(
            "Point cloud needs 3 channels, got {}",
            points.channels()
        )));
    }
    let mut radius = Mat::<T>::new(points.rows(), points.cols(), 1);
    radius
        .as_mut_slice()
        .par_iter_mut()
        .zip(points.as_slice().par_chunks(3))
        .for_each(|(r, p)| {
            *r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        });
    Ok(radius)
}

/// The Z coordinate of an organized point cloud as a depth map.
pub fn depth_channel<T: Float>(points: &Mat<T>) -> Result<Mat<T>> {
    if points.channels() != 3 {
        return Err(RgbdError::UnsupportedInput(format!(
            "Point cloud needs 3 channels, got {}",
            points.channels()
        )));
    }
    Ok(points.channel(2)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cv_core::CameraIntrinsics;

    #[test]
    fn missing_u16_depth_is_nan() {
        let k = CameraIntrinsics::new(100.0, 100.0, 1.0, 1.0).matrix();
        let mut depth = Mat::<u16>::filled(3, 3, 1, 500);
        depth.set(0, 2, 0, 0);
        let points: Mat<f32> = depth_to_points(&depth, &k).unwrap();
        assert!(points.pixel(0, 2).iter().all(|v| v.is_nan()));
        assert_eq!(points.pixel(1, 1), &[0.0, 0.0, 500.0]);
        assert_relative_eq!(points.at(1, 2, 0), 5.0);
    }

    #[test]
    fn radius_and_depth_channel() {
        let points = Mat::from_vec(1, 2, 3, vec![3.0, 4.0, 12.0, f64::NAN, 0.0, 1.0]).unwrap();
        let r = compute_radius(&points).unwrap();
        assert_eq!(r.at(0, 0, 0), 13.0);
        assert!(r.at(0, 1, 0).is_nan());
        let z = depth_channel(&points).unwrap();
        assert_eq!(z.as_slice(), &[12.0, 1.0]);
        assert!(compute_radius(&z).is_err());
    }
}
