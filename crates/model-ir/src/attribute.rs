// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Raw weight payloads attached to operators.

use crate::ModelError;
use tensor_core::DataType;

/// A weight blob (convolution kernels, linear weights, biases) as stored in
/// the weight file: raw little-endian bytes plus declared shape and type.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub dtype: DataType,
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

impl Attribute {
    pub fn new(dtype: DataType, shape: Vec<usize>, data: Vec<u8>) -> Self {
        Self { dtype, shape, data }
    }

    /// Builds an `f32` attribute from values.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self {
            dtype: DataType::Float32,
            shape,
            data,
        }
    }

    /// Number of elements implied by the shape.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Decodes the payload as `f32` values and releases the byte buffer.
    ///
    /// An attribute can be consumed once; a second call sees an empty blob.
    ///
    /// # Errors
    /// Returns [`ModelError::Attribute`] if the blob is empty, is not
    /// `Float32`, or its length is not a multiple of four.
    pub fn take_f32(&mut self) -> Result<Vec<f32>, ModelError> {
        if self.data.is_empty() {
            return Err(ModelError::Attribute {
                detail: "attribute payload is empty".into(),
            });
        }
        if self.dtype != DataType::Float32 {
            return Err(ModelError::Attribute {
                detail: format!("expected f32 payload, found {}", self.dtype),
            });
        }
        if self.data.len() % 4 != 0 {
            return Err(ModelError::Attribute {
                detail: format!("payload of {} bytes is not a whole number of f32", self.data.len()),
            });
        }
        let values = self
            .data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        self.data = Vec::new();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_f32_consumes_once() {
        let mut attr = Attribute::from_f32(vec![2, 2], &[1.0, -2.0, 3.5, 0.0]);
        assert_eq!(attr.num_elements(), 4);
        assert_eq!(attr.take_f32().unwrap(), vec![1.0, -2.0, 3.5, 0.0]);
        assert!(attr.data.is_empty());
        assert!(attr.take_f32().is_err());
    }

    #[test]
    fn test_take_f32_rejects_bad_payloads() {
        let mut wrong_type = Attribute::new(DataType::Int8, vec![4], vec![1, 2, 3, 4]);
        assert!(matches!(wrong_type.take_f32(), Err(ModelError::Attribute { .. })));

        let mut ragged = Attribute::new(DataType::Float32, vec![1], vec![0, 0, 0]);
        assert!(ragged.take_f32().is_err());
    }
}
