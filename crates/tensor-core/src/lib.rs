// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Channel/row/column tensors and arithmetic for graph inference workloads.
//!
//! This crate provides:
//! - [`Tensor`] — a 3-D `f32` tensor with column-major channel planes and a
//!   logical raw shape.
//! - [`Shape`] — dimension lists for logical shapes and error reports.
//! - [`DataType`] — the element types an exported graph may declare.
//! - Core operations: per-channel broadcasting, elementwise add and multiply,
//!   padding, matrix multiplication, axis softmax, ReLU.
//! - [`CsvLoader`] — single-channel tensors from delimited text.

mod csv;
mod dtype;
mod error;
mod ops;
mod shape;
mod tensor;

pub use csv::CsvLoader;
pub use dtype::DataType;
pub use error::TensorError;
pub use ops::{
    add, add_into, broadcast, is_same, matmul, multiply, multiply_into, padded, relu, softmax,
};
pub use shape::Shape;
pub use tensor::Tensor;
