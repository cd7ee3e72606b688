use crate::{ImgprocError, Result};
use cv_core::{cast, Float, Mat};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderMode {
    Constant(f64),
    Replicate,
    Reflect,
    Reflect101,
}

impl Default for BorderMode {
    fn default() -> Self {
        BorderMode::Reflect101
    }
}

impl BorderMode {
    pub(crate) fn fill<T: Float>(&self) -> T {
        match self {
            BorderMode::Constant(v) => cast(*v),
            _ => T::zero(),
        }
    }
}

pub(crate) fn map_coord(coord: isize, len: usize, mode: BorderMode) -> Option<usize> {
    let n = len as isize;
    if n <= 0 {
        return None;
    }

    match mode {
        BorderMode::Constant(_) => {
            if coord < 0 || coord >= n {
                None
            } else {
                Some(coord as usize)
            }
        }
        BorderMode::Replicate => Some(coord.clamp(0, n - 1) as usize),
        BorderMode::Reflect => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c - 1;
            }
            Some(c as usize)
        }
        BorderMode::Reflect101 => {
            if n == 1 {
                return Some(0);
            }
            let period = 2 * n - 2;
            let mut c = coord % period;
            if c < 0 {
                c += period;
            }
            if c >= n {
                c = period - c;
            }
            Some(c as usize)
        }
    }
}

fn check_kernel<T>(kernel: &[T], name: &str) -> Result<()> {
    if kernel.is_empty() || kernel.len() % 2 == 0 {
        return Err(ImgprocError::InvalidKernel(format!(
            "{} size must be odd, got {}",
            name,
            kernel.len()
        )));
    }
    Ok(())
}

/// Separable 2D correlation: `kx` along each row, then `ky` along each column.
///
/// Every channel is filtered independently and the anchor is the kernel
/// center. NaN anywhere in a window reaches the output.
pub fn sep_filter_2d<T: Float>(
    src: &Mat<T>,
    kx: &[T],
    ky: &[T],
    border: BorderMode,
) -> Result<Mat<T>> {
    check_kernel(kx, "kx")?;
    check_kernel(ky, "ky")?;

    let rows = src.rows();
    let cols = src.cols();
    let ch = src.channels();
    if src.is_empty() {
        return Ok(Mat::new(rows, cols, ch));
    }

    let rx = kx.len() / 2;
    let ry = ky.len() / 2;
    let stride = cols * ch;
    let fill: T = border.fill();

    // Horizontal pass (using kx)
    let mut tmp = Mat::<T>::new(rows, cols, ch);
    tmp.as_mut_slice()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = src.row(y);
            let padded_width = cols + 2 * rx;
            let mut padded_row = vec![fill; padded_width * ch];
            for i in 0..padded_width {
                let src_x = (i as isize) - (rx as isize);
                if let Some(ix) = map_coord(src_x, cols, border) {
                    padded_row[i * ch..(i + 1) * ch]
                        .copy_from_slice(&row_in[ix * ch..(ix + 1) * ch]);
                }
            }
            for x in 0..cols {
                for c in 0..ch {
                    let mut sum = T::zero();
                    for (k, &w) in kx.iter().enumerate() {
                        sum += padded_row[(x + k) * ch + c] * w;
                    }
                    row_out[x * ch + c] = sum;
                }
            }
        });

    // Rows outside a constant border are the fill value filtered by kx.
    let fill_row = kx.iter().fold(T::zero(), |acc, &w| acc + fill * w);

    // Vertical pass (using ky)
    let mut dst = Mat::<T>::new(rows, cols, ch);
    dst.as_mut_slice()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            for (k, &w) in ky.iter().enumerate() {
                let sy = (y as isize) + (k as isize) - (ry as isize);
                match map_coord(sy, rows, border) {
                    Some(iy) => {
                        for (out, &v) in row_out.iter_mut().zip(tmp.row(iy)) {
                            *out += v * w;
                        }
                    }
                    None => {
                        for out in row_out.iter_mut() {
                            *out += fill_row * w;
                        }
                    }
                }
            }
        });

    Ok(dst)
}

/// Box filter over a `ksize`×`ksize` window. Unnormalized when `normalize`
/// is false, i.e. a moving sum.
pub fn box_filter<T: Float>(
    src: &Mat<T>,
    ksize: usize,
    normalize: bool,
    border: BorderMode,
) -> Result<Mat<T>> {
    let w: T = if normalize {
        cast(1.0 / ksize as f64)
    } else {
        T::one()
    };
    let kernel = vec![w; ksize];
    sep_filter_2d(src, &kernel, &kernel, border)
}

/// Sobel-family derivative kernels for order (`dx`, `dy`) and aperture `ksize`.
///
/// Returns `(kx, ky)` for use with [`sep_filter_2d`]. A 1-wide aperture is
/// widened to 3 along any axis that is differentiated. With `normalize` the
/// kernels are scaled by `1 / 2^(ksize - order - 1)` so that filtering a
/// ramp of slope 1 yields 1.
pub fn deriv_kernels(
    dx: usize,
    dy: usize,
    ksize: usize,
    normalize: bool,
) -> Result<(Vec<f64>, Vec<f64>)> {
    if ksize % 2 == 0 || ksize > 31 {
        return Err(ImgprocError::InvalidKernel(format!(
            "Derivative aperture must be odd and <= 31, got {}",
            ksize
        )));
    }
    let kx = sobel_kernel_1d(dx, if ksize == 1 && dx > 0 { 3 } else { ksize }, normalize)?;
    let ky = sobel_kernel_1d(dy, if ksize == 1 && dy > 0 { 3 } else { ksize }, normalize)?;
    Ok((kx, ky))
}

fn sobel_kernel_1d(order: usize, ksize: usize, normalize: bool) -> Result<Vec<f64>> {
    if ksize <= order {
        return Err(ImgprocError::InvalidKernel(format!(
            "Aperture {} too small for derivative order {}",
            ksize, order
        )));
    }
    if ksize == 1 {
        return Ok(vec![1.0]);
    }

    // Binomial smoothing followed by repeated first differences.
    let mut k = vec![0i64; ksize + 1];
    k[0] = 1;
    for _ in 0..ksize - order - 1 {
        let mut old = k[0];
        for j in 1..=ksize {
            let new = k[j] + k[j - 1];
            k[j - 1] = old;
            old = new;
        }
    }
    for _ in 0..order {
        let mut old = -k[0];
        for j in 1..=ksize {
            let new = k[j - 1] - k[j];
            k[j - 1] = old;
            old = new;
        }
    }

    let scale = if normalize {
        1.0 / (1u64 << (ksize - order - 1)) as f64
    } else {
        1.0
    };
    Ok(k[..ksize].iter().map(|&v| v as f64 * scale).collect())
}
