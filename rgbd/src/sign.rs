use cv_core::Float;
use nalgebra::Vector3;

/// Normalize `v` and orient it toward the camera (z ≤ 0).
///
/// The zero vector has no direction; passing it yields NaN in every
/// component.
#[inline]
pub fn sign_normal<T: Float>(v: Vector3<T>) -> Vector3<T> {
    let norm = v.norm();
    if v.z > T::zero() {
        -v / norm
    } else {
        v / norm
    }
}

#[inline]
pub fn sign_normal_components<T: Float>(a: T, b: T, c: T) -> Vector3<T> {
    sign_normal(Vector3::new(a, b, c))
}
