// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The three-dimensional `f32` tensor used throughout the runtime.

use std::fmt;

use rand_distr::{Distribution, StandardNormal};

use crate::{Shape, TensorError};

/// An owned `(channels, rows, cols)` tensor of `f32` values.
///
/// # Memory Layout
/// Each channel is a contiguous plane stored in column-major order, so
/// element `(c, r, w)` lives at `c * rows * cols + w * rows + r`.
/// Bulk import and export ([`fill_values`](Tensor::fill_values),
/// [`values`](Tensor::values)) can translate to and from row-major order.
///
/// Besides the physical extents a tensor remembers a *raw shape*: the
/// logical 1-, 2- or 3-D shape set by the last [`reshape`](Tensor::reshape).
/// Layers such as softmax interpret their input through it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    channels: usize,
    rows: usize,
    cols: usize,
    raw_shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a zero-filled tensor.
    ///
    /// The raw shape is `[cols]` for a single row of a single channel,
    /// `[rows, cols]` for a single channel, and `[rows, cols, channels]`
    /// otherwise.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Tensor;
    /// let t = Tensor::new(2, 3, 4);
    /// assert_eq!(t.size(), 24);
    /// assert_eq!(t.raw_shape().dims(), &[3, 4, 2]);
    /// ```
    pub fn new(channels: usize, rows: usize, cols: usize) -> Self {
        Self {
            channels,
            rows,
            cols,
            raw_shape: default_raw_shape(channels, rows, cols),
            data: vec![0.0; channels * rows * cols],
        }
    }

    /// Creates a zero-filled tensor from a `[channels, rows, cols]` slice.
    ///
    /// # Errors
    /// Returns [`TensorError::InvalidRank`] unless exactly three extents are given.
    pub fn from_shape(dims: &[usize]) -> Result<Self, TensorError> {
        match dims {
            [c, r, w] => Ok(Self::new(*c, *r, *w)),
            _ => Err(TensorError::InvalidRank {
                op: "Tensor::from_shape",
                rank: dims.len(),
                expected: "3",
            }),
        }
    }

    /// Creates a tensor and fills it from `values` (see [`fill_values`](Tensor::fill_values)).
    pub fn from_values(
        channels: usize,
        rows: usize,
        cols: usize,
        values: &[f32],
        row_major: bool,
    ) -> Result<Self, TensorError> {
        let mut t = Self::new(channels, rows, cols);
        t.fill_values(values, row_major)?;
        Ok(t)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Physical extents as `[channels, rows, cols]`.
    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.rows, self.cols]
    }

    /// Physical extents as a [`Shape`].
    pub fn shape(&self) -> Shape {
        Shape::chw(self.channels, self.rows, self.cols)
    }

    /// The logical shape recorded on construction or by the last reshape.
    pub fn raw_shape(&self) -> &Shape {
        &self.raw_shape
    }

    #[inline]
    fn offset(&self, channel: usize, row: usize, col: usize) -> usize {
        channel * self.rows * self.cols + col * self.rows + row
    }

    /// Returns the element at `(channel, row, col)`.
    ///
    /// # Panics
    /// Panics if any coordinate is out of range.
    pub fn at(&self, channel: usize, row: usize, col: usize) -> f32 {
        assert!(
            channel < self.channels && row < self.rows && col < self.cols,
            "index ({channel}, {row}, {col}) out of bounds for tensor {:?}",
            self.dims()
        );
        self.data[self.offset(channel, row, col)]
    }

    /// Returns a mutable reference to the element at `(channel, row, col)`.
    ///
    /// # Panics
    /// Panics if any coordinate is out of range.
    pub fn at_mut(&mut self, channel: usize, row: usize, col: usize) -> &mut f32 {
        assert!(
            channel < self.channels && row < self.rows && col < self.cols,
            "index ({channel}, {row}, {col}) out of bounds for tensor {:?}",
            self.dims()
        );
        let offset = self.offset(channel, row, col);
        &mut self.data[offset]
    }

    /// Checked variant of [`at`](Tensor::at).
    pub fn get(&self, channel: usize, row: usize, col: usize) -> Option<f32> {
        if channel < self.channels && row < self.rows && col < self.cols {
            Some(self.data[self.offset(channel, row, col)])
        } else {
            None
        }
    }

    /// Returns the element at a physical buffer offset.
    ///
    /// # Errors
    /// Returns [`TensorError::OutOfBounds`] if `offset >= size()`.
    pub fn index(&self, offset: usize) -> Result<f32, TensorError> {
        self.data
            .get(offset)
            .copied()
            .ok_or(TensorError::OutOfBounds {
                op: "Tensor::index",
                index: offset,
                len: self.data.len(),
            })
    }

    /// Returns one channel plane in column-major order.
    ///
    /// # Panics
    /// Panics if `channel >= channels()`.
    pub fn channel(&self, channel: usize) -> &[f32] {
        assert!(channel < self.channels, "channel {channel} out of bounds");
        let plane = self.rows * self.cols;
        &self.data[channel * plane..(channel + 1) * plane]
    }

    /// Mutable variant of [`channel`](Tensor::channel).
    ///
    /// # Panics
    /// Panics if `channel >= channels()`.
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        assert!(channel < self.channels, "channel {channel} out of bounds");
        let plane = self.rows * self.cols;
        &mut self.data[channel * plane..(channel + 1) * plane]
    }

    /// The physical buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Overwrites the tensor from a flat slice.
    ///
    /// With `row_major = true` each channel plane is read in row-major
    /// order, channel after channel. Otherwise `values` is copied as the
    /// physical (column-major) buffer.
    ///
    /// # Errors
    /// Returns [`TensorError::SizeMismatch`] if `values.len() != size()`.
    pub fn fill_values(&mut self, values: &[f32], row_major: bool) -> Result<(), TensorError> {
        if values.len() != self.data.len() {
            return Err(TensorError::SizeMismatch {
                op: "Tensor::fill_values",
                expected: self.data.len(),
                actual: values.len(),
            });
        }
        if !row_major {
            self.data.copy_from_slice(values);
            return Ok(());
        }
        let (rows, cols) = (self.rows, self.cols);
        let plane = rows * cols;
        for (dst, src) in self
            .data
            .chunks_exact_mut(plane.max(1))
            .zip(values.chunks_exact(plane.max(1)))
        {
            for r in 0..rows {
                for w in 0..cols {
                    dst[w * rows + r] = src[r * cols + w];
                }
            }
        }
        Ok(())
    }

    /// Exports every element, channel after channel.
    ///
    /// With `row_major = true` each plane is emitted in row-major order,
    /// otherwise the physical buffer is returned as-is.
    pub fn values(&self, row_major: bool) -> Vec<f32> {
        if !row_major {
            return self.data.clone();
        }
        let (rows, cols) = (self.rows, self.cols);
        let mut out = Vec::with_capacity(self.data.len());
        for c in 0..self.channels {
            let plane = self.channel(c);
            for r in 0..rows {
                for w in 0..cols {
                    out.push(plane[w * rows + r]);
                }
            }
        }
        out
    }

    /// Sets every element to `1.0`.
    pub fn ones(&mut self) {
        self.fill(1.0);
    }

    /// Fills the tensor with samples from the standard normal distribution.
    pub fn rand(&mut self) {
        let mut rng = rand::thread_rng();
        for x in self.data.iter_mut() {
            *x = StandardNormal.sample(&mut rng);
        }
    }

    /// Applies `f` to every element in place.
    pub fn transform<F>(&mut self, f: F)
    where
        F: Fn(f32) -> f32,
    {
        self.data.iter_mut().for_each(|x| *x = f(*x));
    }

    /// Grows every channel plane by `[top, bottom, left, right]` and fills
    /// the new border with `value`. The original data lands in the offset
    /// sub-region.
    pub fn padding(&mut self, pads: [usize; 4], value: f32) {
        let [top, bottom, left, right] = pads;
        let new_rows = self.rows + top + bottom;
        let new_cols = self.cols + left + right;
        let mut padded = Tensor::new(self.channels, new_rows, new_cols);
        padded.fill(value);
        for c in 0..self.channels {
            let src = self.channel(c);
            let dst = padded.channel_mut(c);
            for w in 0..self.cols {
                let src_col = &src[w * self.rows..(w + 1) * self.rows];
                let start = (w + left) * new_rows + top;
                dst[start..start + self.rows].copy_from_slice(src_col);
            }
        }
        *self = padded;
    }

    /// Changes the tensor's extents while keeping its element count.
    ///
    /// `shape` has one to three entries. A 3-D shape `[a, b, c]` means
    /// `a` channels of `b x c`; 2-D `[a, b]` means one `a x b` channel;
    /// 1-D `[a]` means one `a x 1` channel.
    ///
    /// With `row_major = true` elements keep their row-major logical order,
    /// which moves data. With `row_major = false` the physical buffer is
    /// reinterpreted in place. Either way the raw shape becomes `shape`.
    ///
    /// # Errors
    /// - [`TensorError::InvalidRank`] if `shape` is empty or has more than three entries.
    /// - [`TensorError::SizeMismatch`] if the element count would change.
    pub fn reshape(&mut self, shape: &[usize], row_major: bool) -> Result<(), TensorError> {
        let target = match *shape {
            [a, b, c] => [a, b, c],
            [a, b] => [1, a, b],
            [a] => [1, a, 1],
            _ => {
                return Err(TensorError::InvalidRank {
                    op: "Tensor::reshape",
                    rank: shape.len(),
                    expected: "1..=3",
                })
            }
        };
        let new_size: usize = shape.iter().product();
        if new_size != self.size() {
            return Err(TensorError::SizeMismatch {
                op: "Tensor::reshape",
                expected: self.size(),
                actual: new_size,
            });
        }
        if row_major {
            self.review(target);
        } else {
            [self.channels, self.rows, self.cols] = target;
        }
        self.raw_shape = Shape::from(shape);
        Ok(())
    }

    /// Reshapes to a single dimension of `size()` elements.
    pub fn flatten(&mut self, row_major: bool) {
        let size = self.size();
        if row_major {
            self.review([1, size, 1]);
        } else {
            [self.channels, self.rows, self.cols] = [1, size, 1];
        }
        self.raw_shape = Shape::vector(size);
    }

    /// Moves every element to the position with the same row-major logical
    /// index under the new extents.
    fn review(&mut self, target: [usize; 3]) {
        let logical = self.values(true);
        [self.channels, self.rows, self.cols] = target;
        let (rows, cols) = (self.rows, self.cols);
        let plane = rows * cols;
        for (pos, value) in logical.into_iter().enumerate() {
            let ch = pos / plane;
            let row = (pos - ch * plane) / cols;
            let col = pos - ch * plane - row * cols;
            self.data[ch * plane + col * rows + row] = value;
        }
    }

    /// Logs every channel at `info` level.
    pub fn show(&self) {
        for c in 0..self.channels {
            tracing::info!("Channel: {c}\n{}", PlaneDisplay { tensor: self, channel: c });
        }
    }
}

fn default_raw_shape(channels: usize, rows: usize, cols: usize) -> Shape {
    if channels == 1 && rows == 1 {
        Shape::vector(cols)
    } else if channels == 1 {
        Shape::matrix(rows, cols)
    } else {
        Shape::new(vec![rows, cols, channels])
    }
}

struct PlaneDisplay<'a> {
    tensor: &'a Tensor,
    channel: usize,
}

impl fmt::Display for PlaneDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.tensor.rows {
            for w in 0..self.tensor.cols {
                if w > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>10.4}", self.tensor.at(self.channel, r, w))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tensor {}x{}x{} (raw {})",
            self.channels, self.rows, self.cols, self.raw_shape
        )?;
        for c in 0..self.channels {
            writeln!(f, "Channel: {c}")?;
            write!(
                f,
                "{}",
                PlaneDisplay {
                    tensor: self,
                    channel: c
                }
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: usize) -> Vec<f32> {
        (1..=n).map(|x| x as f32).collect()
    }

    #[test]
    fn test_new_raw_shapes() {
        assert_eq!(Tensor::new(1, 1, 5).raw_shape().dims(), &[5]);
        assert_eq!(Tensor::new(1, 3, 5).raw_shape().dims(), &[3, 5]);
        assert_eq!(Tensor::new(2, 3, 5).raw_shape().dims(), &[3, 5, 2]);
        assert!(Tensor::new(2, 3, 5).data().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_shape_requires_three_dims() {
        assert!(Tensor::from_shape(&[2, 3, 4]).is_ok());
        assert!(matches!(
            Tensor::from_shape(&[2, 3]),
            Err(TensorError::InvalidRank { rank: 2, .. })
        ));
    }

    #[test]
    fn test_column_major_layout() {
        let t = Tensor::from_values(1, 2, 3, &seq(6), true).unwrap();
        // [[1, 2, 3], [4, 5, 6]] stored column by column.
        assert_eq!(t.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(t.at(0, 1, 2), 6.0);
        assert_eq!(t.values(true), seq(6));
        assert_eq!(t.values(false), t.data().to_vec());
    }

    #[test]
    fn test_fill_values_size_mismatch() {
        let mut t = Tensor::new(1, 2, 2);
        assert!(matches!(
            t.fill_values(&[1.0, 2.0], true),
            Err(TensorError::SizeMismatch { expected: 4, actual: 2, .. })
        ));
    }

    #[test]
    fn test_get_and_index_bounds() {
        let t = Tensor::from_values(2, 2, 2, &seq(8), true).unwrap();
        assert_eq!(t.get(1, 1, 1), Some(8.0));
        assert_eq!(t.get(2, 0, 0), None);
        assert_eq!(t.index(0).unwrap(), 1.0);
        assert!(t.index(8).is_err());
    }

    #[test]
    #[should_panic]
    fn test_at_out_of_bounds_panics() {
        let t = Tensor::new(1, 2, 2);
        t.at(0, 2, 0);
    }

    #[test]
    fn test_padding_and_crop() {
        let mut t = Tensor::from_values(2, 3, 4, &seq(24), true).unwrap();
        let original = t.clone();
        t.padding([1, 2, 3, 4], -1.0);
        assert_eq!(t.dims(), [2, 6, 11]);
        assert_eq!(t.at(0, 0, 0), -1.0);
        assert_eq!(t.at(1, 5, 10), -1.0);
        for c in 0..2 {
            for r in 0..3 {
                for w in 0..4 {
                    assert_eq!(t.at(c, r + 1, w + 3), original.at(c, r, w));
                }
            }
        }
    }

    #[test]
    fn test_reshape_row_major_round_trip() {
        let mut t = Tensor::from_values(2, 3, 4, &seq(24), true).unwrap();
        let original = t.clone();

        t.reshape(&[24], true).unwrap();
        assert_eq!(t.dims(), [1, 24, 1]);
        assert_eq!(t.values(true), seq(24));

        t.reshape(&[4, 6], true).unwrap();
        assert_eq!(t.dims(), [1, 4, 6]);
        assert_eq!(t.at(0, 1, 0), 7.0);

        t.reshape(&[2, 3, 4], true).unwrap();
        assert_eq!(t.data(), original.data());
        assert_eq!(t.raw_shape().dims(), &[2, 3, 4]);
    }

    #[test]
    fn test_reshape_physical_keeps_buffer() {
        let mut t = Tensor::from_values(1, 2, 3, &seq(6), true).unwrap();
        let buffer = t.data().to_vec();
        t.reshape(&[3, 2], false).unwrap();
        assert_eq!(t.dims(), [1, 3, 2]);
        assert_eq!(t.data(), buffer.as_slice());
        t.reshape(&[6], false).unwrap();
        assert_eq!(t.dims(), [1, 6, 1]);
        assert_eq!(t.raw_shape().dims(), &[6]);
    }

    #[test]
    fn test_reshape_errors() {
        let mut t = Tensor::new(2, 2, 2);
        assert!(matches!(
            t.reshape(&[3, 3], true),
            Err(TensorError::SizeMismatch { .. })
        ));
        assert!(matches!(
            t.reshape(&[], false),
            Err(TensorError::InvalidRank { .. })
        ));
        assert!(matches!(
            t.reshape(&[1, 2, 2, 2], false),
            Err(TensorError::InvalidRank { .. })
        ));
    }

    #[test]
    fn test_flatten_row_major() {
        let mut t = Tensor::from_values(2, 2, 2, &seq(8), true).unwrap();
        t.flatten(true);
        assert_eq!(t.dims(), [1, 8, 1]);
        assert_eq!(t.raw_shape().dims(), &[8]);
        assert_eq!(t.data(), seq(8).as_slice());
    }

    #[test]
    fn test_transform_ones_clone() {
        let mut t = Tensor::new(1, 2, 2);
        t.ones();
        let snapshot = t.clone();
        t.transform(|x| x * 3.0);
        assert!(t.data().iter().all(|&x| x == 3.0));
        assert!(snapshot.data().iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_rand_is_not_constant() {
        let mut t = Tensor::new(1, 8, 8);
        t.rand();
        let first = t.data()[0];
        assert!(t.data().iter().any(|&x| x != first));
        assert!(t.data().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_display_lists_channels() {
        let t = Tensor::new(2, 1, 2);
        let text = format!("{t}");
        assert!(text.contains("Channel: 0"));
        assert!(text.contains("Channel: 1"));
    }
}
