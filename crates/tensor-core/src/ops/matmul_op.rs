// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication over row-major slices.

use crate::{Shape, TensorError};

/// Performs matrix multiplication: `output = lhs @ rhs`.
///
/// All buffers are row-major: `lhs` is `[m, k]`, `rhs` is `[k, n]` and
/// `output` is `[m, n]`. The output is overwritten.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if any buffer length disagrees
/// with the given dimensions.
pub fn matmul(
    lhs: &[f32],
    rhs: &[f32],
    output: &mut [f32],
    m: usize,
    k: usize,
    n: usize,
) -> Result<(), TensorError> {
    if lhs.len() != m * k || rhs.len() != k * n {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: Shape::new(vec![lhs.len()]),
            rhs: Shape::new(vec![rhs.len()]),
        });
    }
    if output.len() != m * n {
        return Err(TensorError::ShapeMismatch {
            op: "matmul (output)",
            lhs: Shape::matrix(m, n),
            rhs: Shape::new(vec![output.len()]),
        });
    }

    matmul_f32_generic(lhs, rhs, output, m, k, n);

    Ok(())
}

/// Generic (portable) f32 matrix multiplication.
///
/// Uses a simple ikj loop order for better cache locality on the `b` matrix.
fn matmul_f32_generic(a: &[f32], b: &[f32], c: &mut [f32], m: usize, k: usize, n: usize) {
    c.iter_mut().for_each(|x| *x = 0.0);

    // The inner loop is a saxpy on a row of C, sequential in memory.
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            let b_row = &b[p * n..(p + 1) * n];
            for (cj, &bj) in c_row.iter_mut().zip(b_row) {
                *cj += a_ip * bj;
            }
        }
    }
}
