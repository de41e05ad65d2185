// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The intermediate representation of an exported CNN operator graph.
//!
//! This crate defines the records the runtime graph builder consumes:
//!
//! - [`IrOperator`] — one node: type, operand names, parameters, attributes.
//! - [`IrOperand`] — one edge value with its producer, consumers and shape.
//! - [`Parameter`] — typed operator configuration (ints, arrays, strings ...).
//! - [`Attribute`] — a raw weight payload, decoded once into `f32` values.
//! - [`IrGraph`] — the full model, with a **type-state pattern**
//!   (`Loaded` → `Validated`).
//! - [`ModelLoader`] / [`IrLoader`] — loads models from a JSON manifest +
//!   SafeTensors weight file.
//! - [`ModelWriter`] — writes graphs back in the same format.
//!
//! # Supported Model Format
//! A model is stored as:
//! - `model.json` — manifest of operands and operators.
//! - `model.safetensors` — operator attributes in SafeTensors format.
//!
//! # Example
//! ```no_run
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let graph = ModelLoader::load(
//!     Path::new("./models/demo/model.json"),
//!     Path::new("./models/demo/model.safetensors"),
//! )
//! .unwrap();
//! println!("{}", graph.summary());
//! for op in &graph.operators {
//!     println!("  {}", op.summary());
//! }
//! ```

mod attribute;
mod error;
pub mod graph;
mod loader;
pub mod manifest;
mod parameter;
mod writer;

pub use attribute::Attribute;
pub use error::ModelError;
pub use graph::{IrGraph, IrGraphBuilder, IrOperand, IrOperator};
pub use loader::{IrLoader, ModelLoader};
pub use manifest::ModelManifest;
pub use parameter::{Parameter, ParameterKind};
pub use writer::ModelWriter;
