// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape descriptors used for logical shapes and error reporting.

use std::fmt;

/// A list of dimension extents.
///
/// [`crate::Tensor`] always stores three physical dimensions
/// (channels, rows, cols); `Shape` carries the logical view recorded by the
/// last reshape, and the shapes reported in errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// // Logical shape of a 4x4 image with 3 channels, as recorded on construction.
    /// let s = Shape::new(vec![4, 4, 3]);
    /// assert_eq!(s.extended3(), Some([4, 4, 3]));
    /// assert_eq!(s.num_elements(), 48);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// The raw shape of a single row: `[cols]`.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// `[rows, cols]`, the raw shape of a one-channel tensor.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Creates the physical `[channels, rows, cols]` shape.
    pub fn chw(channels: usize, rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![channels, rows, cols],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of the extents; 1 for an empty shape.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the dimensions extended to exactly three entries by
    /// appending trailing `1`s.
    ///
    /// Returns `None` when the rank exceeds three.
    pub fn extended3(&self) -> Option<[usize; 3]> {
        if self.dims.len() > 3 {
            return None;
        }
        let mut out = [1usize; 3];
        out[..self.dims.len()].copy_from_slice(&self.dims);
        Some(out)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(usize::to_string).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl From<[usize; 3]> for Shape {
    fn from(dims: [usize; 3]) -> Self {
        Self::new(dims.to_vec())
    }
}
