// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax activation operation.

use crate::{Shape, TensorError};

/// Computes softmax along one axis of a row-major buffer viewed as
/// `[outer, axis, inner]`.
///
/// Element `(o, a, i)` lives at `o * axis * inner + a * inner + i`. For
/// every `(o, i)` the slice along `a` gets
/// `exp(x - max) / sum(exp(x - max))`, the numerically stable form.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if either buffer is not
/// `outer * axis * inner` long.
pub fn softmax(
    input: &[f32],
    output: &mut [f32],
    outer: usize,
    axis: usize,
    inner: usize,
) -> Result<(), TensorError> {
    let expected = outer * axis * inner;
    if input.len() != expected || output.len() != expected {
        return Err(TensorError::ShapeMismatch {
            op: "softmax",
            lhs: Shape::new(vec![outer, axis, inner]),
            rhs: Shape::new(vec![input.len(), output.len()]),
        });
    }

    for o in 0..outer {
        for i in 0..inner {
            let index = |a: usize| o * axis * inner + a * inner + i;

            let mut max_val = f32::MIN;
            for a in 0..axis {
                max_val = max_val.max(input[index(a)]);
            }

            let mut sum = 0.0f32;
            for a in 0..axis {
                let e = (input[index(a)] - max_val).exp();
                output[index(a)] = e;
                sum += e;
            }

            if sum > 0.0 {
                let inv_sum = 1.0 / sum;
                for a in 0..axis {
                    output[index(a)] *= inv_sum;
                }
            }
        }
    }

    Ok(())
}
