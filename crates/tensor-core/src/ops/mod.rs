// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor arithmetic operations.
//!
//! Elementwise ops come in two forms: one that allocates its result and an
//! `_into` variant that writes into a caller-provided tensor. The slice
//! kernels (`matmul`, `softmax`) work on pre-allocated buffers so layers can
//! reuse their scratch space.

mod arith_op;
mod matmul_op;
mod relu_op;
mod softmax_op;

pub use arith_op::{add, add_into, broadcast, is_same, multiply, multiply_into, padded};
pub use matmul_op::matmul;
pub use relu_op::relu;
pub use softmax_op::softmax;
