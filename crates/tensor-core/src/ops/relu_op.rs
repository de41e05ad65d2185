// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rectified linear unit.

use crate::{Tensor, TensorError};

/// Applies `max(x, 0)` element-wise.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if input and output shapes differ.
pub fn relu(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    if input.dims() != output.dims() {
        return Err(TensorError::ShapeMismatch {
            op: "relu",
            lhs: input.shape(),
            rhs: output.shape(),
        });
    }
    for (d, &x) in output.data_mut().iter_mut().zip(input.data()) {
        *d = x.max(0.0);
    }
    Ok(())
}
