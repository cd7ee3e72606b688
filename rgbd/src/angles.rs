use cv_core::{back_project, Mat};
use nalgebra::Matrix3;

/// Per-pixel viewing angles of a pinhole camera.
///
/// θ is the azimuth of the pixel ray from the optical axis toward +x, φ its
/// elevation toward +y. Each grid is single-channel `f64`.
#[derive(Debug, Clone)]
pub struct ThetaPhi {
    pub cos_theta: Mat<f64>,
    pub sin_theta: Mat<f64>,
    pub cos_phi: Mat<f64>,
    pub sin_phi: Mat<f64>,
}

pub fn compute_theta_phi(rows: usize, cols: usize, k: &Matrix3<f64>) -> ThetaPhi {
    let mut cos_theta = Mat::new(rows, cols, 1);
    let mut sin_theta = Mat::new(rows, cols, 1);
    let mut cos_phi = Mat::new(rows, cols, 1);
    let mut sin_phi = Mat::new(rows, cols, 1);

    for y in 0..rows {
        for x in 0..cols {
            let p = back_project(k, x as f64, y as f64, 1.0);
            let theta = p.x.atan2(p.z);
            let phi = (p.y / p.norm()).asin();
            cos_theta.set(y, x, 0, theta.cos());
            sin_theta.set(y, x, 0, theta.sin());
            cos_phi.set(y, x, 0, phi.cos());
            sin_phi.set(y, x, 0, phi.sin());
        }
    }

    ThetaPhi {
        cos_theta,
        sin_theta,
        cos_phi,
        sin_phi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cv_core::CameraIntrinsics;

    #[test]
    fn principal_point_looks_down_the_axis() {
        let k = CameraIntrinsics::new(100.0, 100.0, 2.0, 1.0).matrix();
        let tp = compute_theta_phi(3, 5, &k);
        assert_relative_eq!(tp.cos_theta.at(1, 2, 0), 1.0);
        assert_relative_eq!(tp.sin_theta.at(1, 2, 0), 0.0);
        assert_relative_eq!(tp.cos_phi.at(1, 2, 0), 1.0);
        assert!(tp.sin_theta.at(1, 4, 0) > 0.0);
        assert!(tp.sin_phi.at(0, 2, 0) < 0.0);
    }

    #[test]
    fn direction_reconstructs_the_ray() {
        let k = CameraIntrinsics::new(50.0, 60.0, 4.0, 3.0).matrix();
        let tp = compute_theta_phi(8, 9, &k);
        let (y, x) = (6, 1);
        let dir = nalgebra::Vector3::new(
            tp.sin_theta.at(y, x, 0) * tp.cos_phi.at(y, x, 0),
            tp.sin_phi.at(y, x, 0),
            tp.cos_theta.at(y, x, 0) * tp.cos_phi.at(y, x, 0),
        );
        let ray = back_project(&k, x as f64, y as f64, 1.0).normalize();
        assert_relative_eq!(dir, ray, epsilon = 1e-12);
    }
}
