// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # layers
//!
//! Executable kernels for the CNN graph runtime.
//!
//! - [`Layer`]: the trait every kernel implements, with an optional
//!   parameter capability backed by [`ParamStore`].
//! - [`kernels`]: convolution, pooling, softmax, linear, flatten, ReLU
//!   and fused elementwise expressions.
//! - [`LayerRegistry`]: maps operator types (`"nn.Conv2d"`, …) to factories.
//!   [`register_all`] returns one pre-filled with every built-in kernel.
//! - [`parser`]: the `add`/`mul`/`@N` expression language.
//!
//! # Example
//! ```
//! use layers::{register_all, Layer, SharedTensor};
//! use std::sync::Arc;
//! use tensor_core::Tensor;
//!
//! let registry = register_all();
//! assert!(registry.contains("nn.ReLU"));
//!
//! let mut relu = layers::kernels::Relu::new();
//! let input: SharedTensor = Arc::new(Tensor::new(1, 2, 2));
//! let mut outputs = vec![None];
//! relu.forward(&[input], &mut outputs).unwrap();
//! assert_eq!(outputs[0].as_ref().unwrap().dims(), [1, 2, 2]);
//! ```

mod error;
pub mod kernels;
mod layer;
pub mod parser;
mod registry;

pub use error::{ExpressionError, InferError, ParamError, ParseError, RegistryError};
pub use layer::{BoundLayer, Layer, NodeHandle, OperatorView, ParamStore, SharedTensor};
pub use registry::{register_all, LayerFactory, LayerRegistry};
