use crate::convolve::{map_coord, BorderMode};
use crate::{ImgprocError, Result};
use cv_core::{cast, Float, Mat};
use nalgebra::Point2;
use rayon::prelude::*;

/// Per-destination-pixel source coordinates for [`remap_bilinear`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemapTable {
    rows: usize,
    cols: usize,
    map_x: Vec<f32>,
    map_y: Vec<f32>,
}

impl RemapTable {
    pub fn new(rows: usize, cols: usize, map_x: Vec<f32>, map_y: Vec<f32>) -> Result<Self> {
        let len = rows * cols;
        if map_x.len() != len || map_y.len() != len {
            return Err(ImgprocError::DimensionMismatch(format!(
                "Remap table {}x{} needs {} entries, got map_x={} map_y={}",
                rows,
                cols,
                len,
                map_x.len(),
                map_y.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            map_x,
            map_y,
        })
    }

    /// Build a table from a function of the destination (row, col) returning
    /// the source (x, y).
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> (f32, f32),
    {
        let mut map_x = Vec::with_capacity(rows * cols);
        let mut map_y = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let (x, y) = f(r, c);
                map_x.push(x);
                map_y.push(y);
            }
        }
        Self {
            rows,
            cols,
            map_x,
            map_y,
        }
    }

    pub fn identity(rows: usize, cols: usize) -> Self {
        Self::from_fn(rows, cols, |r, c| (c as f32, r as f32))
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Point2<f32> {
        let idx = row * self.cols + col;
        Point2::new(self.map_x[idx], self.map_y[idx])
    }
}

fn sample<T: Float>(src: &Mat<T>, x: isize, y: isize, ch: usize, border: BorderMode) -> T {
    match (
        map_coord(x, src.cols(), border),
        map_coord(y, src.rows(), border),
    ) {
        (Some(ix), Some(iy)) => src.at(iy, ix, ch),
        _ => border.fill(),
    }
}

/// Bilinear resampling: `dst(r, c) = src(table.get(r, c))`.
///
/// The output has the table's size and the source's channel count. All four
/// taps are always read, so NaN in any tap reaches the output.
pub fn remap_bilinear<T: Float>(src: &Mat<T>, table: &RemapTable, border: BorderMode) -> Mat<T> {
    let ch = src.channels();
    let mut dst = Mat::<T>::new(table.rows, table.cols, ch);
    if table.rows == 0 || table.cols == 0 {
        return dst;
    }
    let fill: T = border.fill();
    let one = T::one();

    dst.as_mut_slice()
        .par_chunks_mut(table.cols * ch)
        .enumerate()
        .for_each(|(r, row_out)| {
            for c in 0..table.cols {
                let p = table.get(r, c);
                let out = &mut row_out[c * ch..(c + 1) * ch];
                if !p.x.is_finite() || !p.y.is_finite() {
                    out.iter_mut().for_each(|v| *v = fill);
                    continue;
                }
                let x0 = p.x.floor();
                let y0 = p.y.floor();
                let fx: T = cast((p.x - x0) as f64);
                let fy: T = cast((p.y - y0) as f64);
                let (x0, y0) = (x0 as isize, y0 as isize);

                for (k, v) in out.iter_mut().enumerate() {
                    let v00 = sample(src, x0, y0, k, border);
                    let v10 = sample(src, x0 + 1, y0, k, border);
                    let v01 = sample(src, x0, y0 + 1, k, border);
                    let v11 = sample(src, x0 + 1, y0 + 1, k, border);

                    let v0 = v00 * (one - fx) + v10 * fx;
                    let v1 = v01 * (one - fx) + v11 * fx;
                    *v = v0 * (one - fy) + v1 * fy;
                }
            }
        });

    dst
}
