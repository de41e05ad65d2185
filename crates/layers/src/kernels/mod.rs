// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Built-in layer kernels.

mod adaptive_avg_pool;
mod conv;
mod expression;
mod flatten;
mod linear;
mod max_pool;
mod relu;
mod softmax;

pub use adaptive_avg_pool::AdaptiveAveragePooling;
pub use conv::Convolution;
pub use expression::Expression;
pub use flatten::Flatten;
pub use linear::Linear;
pub use max_pool::MaxPooling;
pub use relu::Relu;
pub use softmax::Softmax;
