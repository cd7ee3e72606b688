use crate::mat::Element;
use nalgebra::RealField;

/// Floating-point working precision (`f32` or `f64`).
///
/// NaN is the invalidity sentinel of every floating-point grid in the
/// workspace: it marks "no measurement" and is copied, never recomputed.
pub trait Float: Element + RealField + Copy {
    fn nan() -> Self;
    fn is_nan(self) -> bool;
}

impl Float for f32 {
    #[inline]
    fn nan() -> Self {
        f32::NAN
    }
    #[inline]
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl Float for f64 {
    #[inline]
    fn nan() -> Self {
        f64::NAN
    }
    #[inline]
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}

/// Convert an `f64` constant into the working precision.
#[inline]
pub fn cast<T: Float>(v: f64) -> T {
    nalgebra::convert(v)
}
