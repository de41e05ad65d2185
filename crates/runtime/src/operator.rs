// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime graph nodes and the operands flowing between them.

use std::collections::BTreeMap;
use std::fmt;

use layers::{BoundLayer, SharedTensor};
use model_ir::{Attribute, Parameter};
use tensor_core::DataType;

/// A value on a graph edge: one tensor slot per batch item.
#[derive(Debug, Clone)]
pub struct RuntimeOperand {
    /// Producer's name for input operands, the owning node's name for outputs.
    pub name: String,
    /// Declared shape, batch first.
    pub shape: Vec<usize>,
    pub dtype: DataType,
    pub data: Vec<Option<SharedTensor>>,
}

impl RuntimeOperand {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype,
            data: Vec::new(),
        }
    }

    /// Batch size recorded in the declared shape.
    pub fn batch(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Whether every slot holds a tensor.
    pub fn is_filled(&self) -> bool {
        !self.data.is_empty() && self.data.iter().all(Option::is_some)
    }
}

/// What the scheduler does with a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Fed by the caller's batch.
    Input,
    /// Exposes its input operand as the graph result.
    Output,
    /// Executes a bound layer.
    Compute,
}

impl NodeKind {
    /// Classifies an operator type tag.
    pub fn of(op_type: &str) -> Self {
        match op_type {
            "pnnx.Input" | "Input" => NodeKind::Input,
            "pnnx.Output" | "Output" => NodeKind::Output,
            _ => NodeKind::Compute,
        }
    }
}

/// A node of the runtime graph.
#[derive(Debug)]
pub struct RuntimeOperator {
    pub name: String,
    /// Registry key, or one of the Input/Output sentinels.
    pub op_type: String,
    pub params: BTreeMap<String, Parameter>,
    pub attributes: BTreeMap<String, Attribute>,
    /// Input operands in declaration order.
    pub input_operands: Vec<RuntimeOperand>,
    /// Names of the consumers of this node's outputs.
    pub output_names: Vec<String>,
    /// Resolved successors, name → node index.
    pub output_operators: BTreeMap<String, usize>,
    /// Operand names this node produces in the IR.
    pub(crate) outputs: Vec<String>,
    pub layer: Option<BoundLayer>,
    pub output_operand: Option<RuntimeOperand>,
}

impl RuntimeOperator {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            params: BTreeMap::new(),
            attributes: BTreeMap::new(),
            input_operands: Vec::new(),
            output_names: Vec::new(),
            output_operators: BTreeMap::new(),
            outputs: Vec::new(),
            layer: None,
            output_operand: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        NodeKind::of(&self.op_type)
    }

    /// The first input operand produced by `producer`.
    pub fn input_operand(&self, producer: &str) -> Option<&RuntimeOperand> {
        self.input_operands.iter().find(|o| o.name == producer)
    }

    /// Output tensors of this node; an Output node reports its input.
    pub fn result_slots(&self) -> &[Option<SharedTensor>] {
        match self.kind() {
            NodeKind::Output => self
                .input_operands
                .first()
                .map(|o| o.data.as_slice())
                .unwrap_or(&[]),
            _ => self
                .output_operand
                .as_ref()
                .map(|o| o.data.as_slice())
                .unwrap_or(&[]),
        }
    }
}

impl fmt::Display for RuntimeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<&str> = self.input_operands.iter().map(|o| o.name.as_str()).collect();
        write!(f, "{} [{}] <- {:?}", self.name, self.op_type, inputs)?;
        if !self.output_names.is_empty() {
            write!(f, " -> {:?}", self.output_names)?;
        }
        if let Some(out) = &self.output_operand {
            write!(f, " {:?}", out.shape)?;
        }
        Ok(())
    }
}
