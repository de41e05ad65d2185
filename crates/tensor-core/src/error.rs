// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::Shape;

/// Errors that can occur during tensor operations.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The number of supplied values does not match the tensor's element count.
    #[error("size mismatch in {op}: expected {expected} elements, got {actual}")]
    SizeMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A shape was given with an unsupported number of dimensions.
    #[error("invalid rank for {op}: {rank} (expected {expected})")]
    InvalidRank {
        op: &'static str,
        rank: usize,
        expected: &'static str,
    },

    /// The operands cannot be broadcast against each other.
    #[error("cannot broadcast {lhs} with {rhs}")]
    Broadcast { lhs: Shape, rhs: Shape },

    /// An element index fell outside the tensor.
    #[error("index {index} out of bounds for {op} (len {len})")]
    OutOfBounds {
        op: &'static str,
        index: usize,
        len: usize,
    },

    /// A CSV source could not be read or had an inconsistent layout.
    #[error("csv error for {path}: {detail}")]
    Csv { path: String, detail: String },
}
