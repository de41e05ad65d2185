// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Builds an executable graph from an exported model and runs it.
//!
//! The runtime takes:
//! - A validated `IrGraph` from `model-ir`, through any [`IrLoader`](model_ir::IrLoader).
//! - A [`LayerRegistry`](layers::LayerRegistry) that turns operators into layers.
//!
//! And executes the nodes in topological order, handing tensor handles
//! from each producer to the matching input slot of its consumers.
//!
//! # Lifecycle
//! ```text
//! NeedInit → NeedBuild → Completed
//! ```
//! `forward` is only accepted in `Completed`; building twice is a no-op.

mod config;
mod error;
mod graph;
mod metrics;
mod operator;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use graph::{plane_dims, GraphState, RuntimeGraph};
pub use metrics::{ForwardMetrics, LayerMetrics};
pub use operator::{NodeKind, RuntimeOperand, RuntimeOperator};
