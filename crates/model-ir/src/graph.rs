// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The exported operator graph: operators connected through named operands.
//!
//! # Type-State Pattern
//!
//! The graph transitions through states enforced at compile time:
//!
//! ```text
//! IrGraph<Loaded>     — records parsed, edges not yet checked.
//!       │  .validate()
//!       ▼
//! IrGraph<Validated>  — every reference resolves, ready for the runtime.
//! ```
//!
//! The runtime graph builder only accepts `IrGraph<Validated>`.

use crate::{Attribute, ModelError, Parameter};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── Records ────────────────────────────────────────────────────────

/// A value flowing along an edge: produced by one operator, consumed by
/// any number of others.
#[derive(Debug, Clone, PartialEq)]
pub struct IrOperand {
    pub name: String,
    /// Name of the producing operator.
    pub producer: String,
    /// Names of the consuming operators.
    pub consumers: Vec<String>,
    /// Declared shape, batch first.
    pub shape: Vec<usize>,
    /// Element type tag (0 = unknown, 1 = f32).
    pub dtype: i32,
}

/// One node of the exported graph.
#[derive(Debug, Clone, PartialEq)]
pub struct IrOperator {
    pub name: String,
    /// Operator type, e.g. `"nn.Conv2d"` or `"pnnx.Input"`.
    pub op_type: String,
    /// Names of the consumed operands, in argument order.
    pub inputs: Vec<String>,
    /// Names of the produced operands.
    pub outputs: Vec<String>,
    pub params: BTreeMap<String, Parameter>,
    pub attributes: BTreeMap<String, Attribute>,
}

impl IrOperator {
    pub fn new(name: impl Into<String>, op_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds or replaces a parameter.
    pub fn with_param(&mut self, name: &str, value: Parameter) -> &mut Self {
        self.params.insert(name.to_string(), value);
        self
    }

    /// Adds or replaces an attribute.
    pub fn with_attribute(&mut self, name: &str, value: Attribute) -> &mut Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// One-line description.
    pub fn summary(&self) -> String {
        format!(
            "{:<24} {:<22} in={:?} out={:?} params={} attrs={}",
            self.name,
            self.op_type,
            self.inputs,
            self.outputs,
            self.params.len(),
            self.attributes.len(),
        )
    }
}

// ── IrGraph ────────────────────────────────────────────────────────

/// The complete exported model.
///
/// The generic parameter `S` encodes the validation state at compile time.
#[derive(Debug, Clone)]
pub struct IrGraph<S: GraphState = Loaded> {
    /// Human-readable model name.
    pub name: String,
    pub operands: Vec<IrOperand>,
    /// Operators in file order.
    pub operators: Vec<IrOperator>,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl IrGraph<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(name: String, operands: Vec<IrOperand>, operators: Vec<IrOperator>) -> Self {
        Self {
            name,
            operands,
            operators,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - The graph has at least one operator.
    /// - Operator names and operand names are unique.
    /// - Every operand an operator references exists.
    /// - Every operand's producer and consumers are operators.
    pub fn validate(self) -> Result<IrGraph<Validated>, ModelError> {
        if self.operators.is_empty() {
            return Err(ModelError::InvalidGraph(
                "model graph contains no operators".into(),
            ));
        }

        let mut operator_names = HashSet::new();
        for op in &self.operators {
            if !operator_names.insert(op.name.as_str()) {
                return Err(ModelError::InvalidOperator {
                    operator: op.name.clone(),
                    detail: "duplicate operator name".into(),
                });
            }
        }

        let mut operand_names = HashSet::new();
        for operand in &self.operands {
            if !operand_names.insert(operand.name.as_str()) {
                return Err(ModelError::InvalidGraph(format!(
                    "duplicate operand name '{}'",
                    operand.name
                )));
            }
            if !operator_names.contains(operand.producer.as_str()) {
                return Err(ModelError::InvalidGraph(format!(
                    "operand '{}' is produced by unknown operator '{}'",
                    operand.name, operand.producer
                )));
            }
            if let Some(consumer) = operand
                .consumers
                .iter()
                .find(|c| !operator_names.contains(c.as_str()))
            {
                return Err(ModelError::InvalidGraph(format!(
                    "operand '{}' is consumed by unknown operator '{consumer}'",
                    operand.name
                )));
            }
        }

        for op in &self.operators {
            for name in op.inputs.iter().chain(&op.outputs) {
                if !operand_names.contains(name.as_str()) {
                    return Err(ModelError::InvalidOperator {
                        operator: op.name.clone(),
                        detail: format!("references unknown operand '{name}'"),
                    });
                }
            }
        }

        Ok(IrGraph {
            name: self.name,
            operands: self.operands,
            operators: self.operators,
            _state: std::marker::PhantomData,
        })
    }
}

// ── Validated state ────────────────────────────────────────────────

impl IrGraph<Validated> {
    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }

    /// Looks up an operand by name.
    pub fn operand(&self, name: &str) -> Option<&IrOperand> {
        self.operands.iter().find(|o| o.name == name)
    }

    /// Looks up an operator by name.
    pub fn operator(&self, name: &str) -> Option<&IrOperator> {
        self.operators.iter().find(|o| o.name == name)
    }

    /// Total number of weight values carried by all attributes.
    pub fn total_weight_elements(&self) -> usize {
        self.operators
            .iter()
            .flat_map(|op| op.attributes.values())
            .map(Attribute::num_elements)
            .sum()
    }

    /// Returns a summary string describing the model.
    pub fn summary(&self) -> String {
        format!(
            "Model '{}': {} operators, {} operands, {} weight values",
            self.name,
            self.operators.len(),
            self.operands.len(),
            self.total_weight_elements(),
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for IrGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IrGraph '{}' ({} operators):", self.name, self.operators.len())?;
        for op in &self.operators {
            writeln!(f, "  {}", op.summary())?;
        }
        Ok(())
    }
}

// ── Builder ────────────────────────────────────────────────────────

/// Assembles an IR graph in code, deriving operand producers and
/// consumers from the operators that reference them.
///
/// # Example
/// ```
/// use model_ir::{IrGraphBuilder, Parameter};
///
/// let mut b = IrGraphBuilder::new("relu-net");
/// b.input("pnnx_input_0", "x", &[1, 1, 2, 2]);
/// b.operator("relu", "nn.ReLU", &["x"], "y", &[1, 1, 2, 2]);
/// b.output("pnnx_output_0", &["y"]);
/// let graph = b.build().unwrap();
/// assert_eq!(graph.num_operators(), 3);
/// ```
#[derive(Debug, Default)]
pub struct IrGraphBuilder {
    name: String,
    shapes: Vec<(String, Vec<usize>)>,
    operators: Vec<IrOperator>,
}

impl IrGraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a `pnnx.Input` operator producing operand `output`.
    pub fn input(&mut self, name: &str, output: &str, shape: &[usize]) -> &mut IrOperator {
        self.operator(name, "pnnx.Input", &[], output, shape)
    }

    /// Adds an operator consuming `inputs` and producing operand `output`.
    pub fn operator(
        &mut self,
        name: &str,
        op_type: &str,
        inputs: &[&str],
        output: &str,
        shape: &[usize],
    ) -> &mut IrOperator {
        self.shapes.push((output.to_string(), shape.to_vec()));
        let mut op = IrOperator::new(name, op_type);
        op.inputs = inputs.iter().map(|s| s.to_string()).collect();
        op.outputs = vec![output.to_string()];
        self.push(op)
    }

    /// Adds a `pnnx.Output` sink consuming `inputs`.
    pub fn output(&mut self, name: &str, inputs: &[&str]) -> &mut IrOperator {
        let mut op = IrOperator::new(name, "pnnx.Output");
        op.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self.push(op)
    }

    fn push(&mut self, op: IrOperator) -> &mut IrOperator {
        let index = self.operators.len();
        self.operators.push(op);
        &mut self.operators[index]
    }

    /// Derives the operand records and validates the result.
    pub fn build(self) -> Result<IrGraph<Validated>, ModelError> {
        let mut consumers: HashMap<&str, Vec<String>> = HashMap::new();
        for op in &self.operators {
            for input in &op.inputs {
                consumers
                    .entry(input.as_str())
                    .or_default()
                    .push(op.name.clone());
            }
        }

        let mut operands = Vec::with_capacity(self.shapes.len());
        for op in &self.operators {
            for output in &op.outputs {
                let shape = self
                    .shapes
                    .iter()
                    .find(|(name, _)| name == output)
                    .map(|(_, s)| s.clone())
                    .unwrap_or_default();
                operands.push(IrOperand {
                    name: output.clone(),
                    producer: op.name.clone(),
                    consumers: consumers.remove(output.as_str()).unwrap_or_default(),
                    shape,
                    dtype: 1,
                });
            }
        }

        IrGraph::new(self.name, operands, self.operators).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> IrGraphBuilder {
        let mut b = IrGraphBuilder::new("chain");
        b.input("in", "0", &[1, 3, 4, 4]);
        b.operator("relu", "nn.ReLU", &["0"], "1", &[1, 3, 4, 4]);
        b.output("out", &["1"]);
        b
    }

    #[test]
    fn test_builder_derives_edges() {
        let graph = chain().build().unwrap();
        let x = graph.operand("0").unwrap();
        assert_eq!(x.producer, "in");
        assert_eq!(x.consumers, vec!["relu".to_string()]);
        assert_eq!(graph.operand("1").unwrap().consumers, vec!["out".to_string()]);
        assert_eq!(graph.operator("relu").unwrap().op_type, "nn.ReLU");
    }

    #[test]
    fn test_validate_empty() {
        let graph = IrGraph::new("empty".into(), vec![], vec![]);
        assert!(graph.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_operator() {
        let mut b = chain();
        b.operator("relu", "nn.ReLU", &["1"], "2", &[1, 3, 4, 4]);
        assert!(matches!(b.build(), Err(ModelError::InvalidOperator { .. })));
    }

    #[test]
    fn test_validate_unknown_operand() {
        let mut b = chain();
        b.output("out2", &["missing"]);
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_validate_unknown_consumer() {
        let graph = chain().build().unwrap();
        let mut operands = graph.operands.clone();
        operands[0].consumers.push("ghost".into());
        let reloaded = IrGraph::new("chain".into(), operands, graph.operators.clone());
        assert!(matches!(reloaded.validate(), Err(ModelError::InvalidGraph(_))));
    }

    #[test]
    fn test_summary_counts_weights() {
        let mut b = chain();
        b.operator("fc", "nn.Linear", &["1"], "2", &[1, 2])
            .with_param("bias", Parameter::Bool(false))
            .with_attribute("weight", Attribute::from_f32(vec![2, 48], &[0.0; 96]));
        let graph = b.build().unwrap();
        assert_eq!(graph.total_weight_elements(), 96);
        assert!(graph.summary().contains("4 operators"));
        assert!(format!("{graph}").contains("nn.Linear"));
    }
}
