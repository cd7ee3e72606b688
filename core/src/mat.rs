use crate::float::{cast, Float};
use nalgebra::Matrix3;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    U16,
    F32,
    F64,
}

impl DataType {
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::U16 => "u16",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatShape {
    pub rows: usize,
    pub cols: usize,
    pub channels: usize,
}

impl MatShape {
    pub fn new(rows: usize, cols: usize, channels: usize) -> Self {
        Self {
            rows,
            cols,
            channels,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
            .saturating_mul(self.cols)
            .saturating_mul(self.channels)
    }

    pub fn checked_len(&self) -> Option<usize> {
        self.rows
            .checked_mul(self.cols)
            .and_then(|partial| partial.checked_mul(self.channels))
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Same grid size, channel count ignored.
    pub fn same_size(&self, other: &MatShape) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }
}

/// Scalar types that can live in a [`Mat`].
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn as_f64(self) -> f64;
    fn into_any(mat: Mat<Self>) -> AnyMat;
    fn from_any(any: &AnyMat) -> Option<&Mat<Self>>;
}

impl Element for u16 {
    const DATA_TYPE: DataType = DataType::U16;

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn into_any(mat: Mat<Self>) -> AnyMat {
        AnyMat::U16(mat)
    }
    fn from_any(any: &AnyMat) -> Option<&Mat<Self>> {
        match any {
            AnyMat::U16(m) => Some(m),
            _ => None,
        }
    }
}

impl Element for f32 {
    const DATA_TYPE: DataType = DataType::F32;

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn into_any(mat: Mat<Self>) -> AnyMat {
        AnyMat::F32(mat)
    }
    fn from_any(any: &AnyMat) -> Option<&Mat<Self>> {
        match any {
            AnyMat::F32(m) => Some(m),
            _ => None,
        }
    }
}

impl Element for f64 {
    const DATA_TYPE: DataType = DataType::F64;

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
    fn into_any(mat: Mat<Self>) -> AnyMat {
        AnyMat::F64(mat)
    }
    fn from_any(any: &AnyMat) -> Option<&Mat<Self>> {
        match any {
            AnyMat::F64(m) => Some(m),
            _ => None,
        }
    }
}

/// Dense row-major grid with interleaved channels.
///
/// **Layout Convention:**
/// Channels are the fastest-varying dimension, followed by columns, then rows
/// (HWC). The element at (row, col, ch) lives at
/// `index = (row * cols + col) * channels + ch`, so a pixel is a contiguous
/// `channels`-long slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Mat<T> {
    shape: MatShape,
    data: Vec<T>,
}

impl<T: Element> Mat<T> {
    /// Default-initialized (zero) grid.
    pub fn new(rows: usize, cols: usize, channels: usize) -> Self {
        Self::filled(rows, cols, channels, T::default())
    }

    pub fn filled(rows: usize, cols: usize, channels: usize, value: T) -> Self {
        assert!(channels > 0, "a Mat needs at least one channel");
        let shape = MatShape::new(rows, cols, channels);
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }

    pub fn from_vec(
        rows: usize,
        cols: usize,
        channels: usize,
        data: Vec<T>,
    ) -> crate::Result<Self> {
        if channels == 0 {
            return Err(crate::Error::InvalidInput(
                "a Mat needs at least one channel".into(),
            ));
        }
        let shape = MatShape::new(rows, cols, channels);
        let expected = shape.checked_len().ok_or_else(|| {
            crate::Error::DimensionMismatch(format!("Shape {:?} overflows usize", shape))
        })?;
        if data.len() != expected {
            return Err(crate::Error::DimensionMismatch(format!(
                "Data size mismatch: got {}, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn from_fn<F>(rows: usize, cols: usize, channels: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> T,
    {
        assert!(channels > 0, "a Mat needs at least one channel");
        let shape = MatShape::new(rows, cols, channels);
        let mut data = Vec::with_capacity(shape.len());
        for r in 0..rows {
            for c in 0..cols {
                for ch in 0..channels {
                    data.push(f(r, c, ch));
                }
            }
        }
        Self { shape, data }
    }

    pub fn shape(&self) -> MatShape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.shape.rows && col < self.shape.cols);
        (row * self.shape.cols + col) * self.shape.channels
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize, ch: usize) -> T {
        self.data[self.offset(row, col) + ch]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, ch: usize, value: T) {
        let i = self.offset(row, col) + ch;
        self.data[i] = value;
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &[T] {
        let start = self.offset(row, col);
        &self.data[start..start + self.shape.channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> &mut [T] {
        let start = self.offset(row, col);
        let end = start + self.shape.channels;
        &mut self.data[start..end]
    }

    /// All `cols * channels` elements of a row.
    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        let stride = self.shape.cols * self.shape.channels;
        &self.data[row * stride..(row + 1) * stride]
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Pixels in row-major order, each a `channels`-long slice.
    pub fn pixels(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.shape.channels)
    }

    pub fn pixels_mut(&mut self) -> std::slice::ChunksExactMut<'_, T> {
        self.data.chunks_exact_mut(self.shape.channels)
    }

    /// Copy one channel out into a single-channel grid.
    pub fn channel(&self, ch: usize) -> crate::Result<Mat<T>> {
        if ch >= self.shape.channels {
            return Err(crate::Error::InvalidInput(format!(
                "Channel {} out of range for a {}-channel Mat",
                ch, self.shape.channels
            )));
        }
        let data = self.pixels().map(|px| px[ch]).collect();
        Mat::from_vec(self.shape.rows, self.shape.cols, 1, data)
    }

    pub fn map<U: Element, F: Fn(T) -> U>(&self, f: F) -> Mat<U> {
        Mat {
            shape: self.shape,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Element-wise conversion to a floating-point precision.
    pub fn convert<U: Float>(&self) -> Mat<U> {
        self.map(|v| cast::<U>(v.as_f64()))
    }

    pub fn same_size<U>(&self, other: &Mat<U>) -> bool {
        self.shape.same_size(&other.shape)
    }
}

/// Build a 3×3 matrix from a flat row-major record of 9 scalars.
#[inline]
pub fn matrix3_from_flat<T: Float>(flat: &[T]) -> Matrix3<T> {
    debug_assert_eq!(flat.len(), 9);
    Matrix3::from_row_slice(&flat[..9])
}

/// Flatten a 3×3 matrix into a row-major record of 9 scalars.
#[inline]
pub fn matrix3_to_flat<T: Float>(m: &Matrix3<T>) -> [T; 9] {
    let mut out = [T::zero(); 9];
    for r in 0..3 {
        for c in 0..3 {
            out[r * 3 + c] = m[(r, c)];
        }
    }
    out
}

/// A [`Mat`] whose element type is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyMat {
    U16(Mat<u16>),
    F32(Mat<f32>),
    F64(Mat<f64>),
}

impl AnyMat {
    pub fn data_type(&self) -> DataType {
        match self {
            AnyMat::U16(_) => DataType::U16,
            AnyMat::F32(_) => DataType::F32,
            AnyMat::F64(_) => DataType::F64,
        }
    }

    pub fn shape(&self) -> MatShape {
        match self {
            AnyMat::U16(m) => m.shape(),
            AnyMat::F32(m) => m.shape(),
            AnyMat::F64(m) => m.shape(),
        }
    }

    pub fn rows(&self) -> usize {
        self.shape().rows
    }

    pub fn cols(&self) -> usize {
        self.shape().cols
    }

    pub fn channels(&self) -> usize {
        self.shape().channels
    }

    pub fn is_empty(&self) -> bool {
        self.shape().is_empty()
    }

    /// Borrow the typed grid if the element type matches.
    pub fn get<T: Element>(&self) -> Option<&Mat<T>> {
        T::from_any(self)
    }

    /// View in floating-point precision `T`, converting only when needed.
    pub fn to_float<T: Float>(&self) -> Cow<'_, Mat<T>> {
        if let Some(m) = T::from_any(self) {
            return Cow::Borrowed(m);
        }
        Cow::Owned(match self {
            AnyMat::U16(m) => m.convert(),
            AnyMat::F32(m) => m.convert(),
            AnyMat::F64(m) => m.convert(),
        })
    }
}

impl Default for AnyMat {
    fn default() -> Self {
        AnyMat::F32(Mat::new(0, 0, 1))
    }
}

impl<T: Element> From<Mat<T>> for AnyMat {
    fn from(mat: Mat<T>) -> Self {
        T::into_any(mat)
    }
}
