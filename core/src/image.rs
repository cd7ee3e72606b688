//! Bridges between `image` buffers and [`Mat`] grids.

use crate::float::Float;
use crate::mat::Mat;
use crate::{Error, Result};
use ::image::{ImageBuffer, Luma, Rgb, RgbImage};

/// 16-bit depth map as stored by most RGB-D sensors (millimetres, 0 = missing).
pub type DepthImage16 = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Floating-point depth map (metres or millimetres, NaN = missing).
pub type DepthImage32 = ImageBuffer<Luma<f32>, Vec<f32>>;

pub fn mat_from_depth16(img: &DepthImage16) -> Mat<u16> {
    let (w, h) = img.dimensions();
    Mat::from_fn(h as usize, w as usize, 1, |r, c, _| {
        img.get_pixel(c as u32, r as u32)[0]
    })
}

pub fn mat_from_depth32(img: &DepthImage32) -> Mat<f32> {
    let (w, h) = img.dimensions();
    Mat::from_fn(h as usize, w as usize, 1, |r, c, _| {
        img.get_pixel(c as u32, r as u32)[0]
    })
}

pub fn depth16_from_mat(mat: &Mat<u16>) -> Result<DepthImage16> {
    if mat.channels() != 1 {
        return Err(Error::DimensionMismatch(format!(
            "Depth image needs 1 channel, got {}",
            mat.channels()
        )));
    }
    ImageBuffer::from_raw(
        mat.cols() as u32,
        mat.rows() as u32,
        mat.as_slice().to_vec(),
    )
    .ok_or_else(|| Error::DimensionMismatch("Buffer too small for depth image".into()))
}

/// Encode a 3-channel normal field as RGB, mapping [-1, 1] to [0, 255].
/// Invalid (NaN) normals become black.
pub fn normals_to_rgb<T: Float>(normals: &Mat<T>) -> Result<RgbImage> {
    if normals.channels() != 3 {
        return Err(Error::DimensionMismatch(format!(
            "Normal field needs 3 channels, got {}",
            normals.channels()
        )));
    }
    let mut out = RgbImage::new(normals.cols() as u32, normals.rows() as u32);
    for (i, px) in normals.pixels().enumerate() {
        let r = (i / normals.cols()) as u32;
        let c = (i % normals.cols()) as u32;
        let mut rgb = [0u8; 3];
        if !px.iter().any(|v| v.is_nan()) {
            for (dst, v) in rgb.iter_mut().zip(px) {
                *dst = ((v.as_f64() + 1.0) * 127.5).round().clamp(0.0, 255.0) as u8;
            }
        }
        out.put_pixel(c, r, Rgb(rgb));
    }
    Ok(out)
}
