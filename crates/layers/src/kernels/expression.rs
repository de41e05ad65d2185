// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise expressions over several input operands.
//!
//! The layer receives the batches of all referenced operands concatenated:
//! with batch size `b`, operand `@N` item `i` is `inputs[N * b + i]`. The
//! batch size is the number of output slots.

use std::sync::Arc;

use tensor_core::{Tensor, TensorError};

use crate::parser::{ExprNode, ExprTree};
use crate::{ExpressionError, InferError, Layer, OperatorView, ParseError, SharedTensor};

type BinaryOp = fn(&Tensor, &Tensor) -> Result<Tensor, TensorError>;

/// Evaluates an `add`/`mul` expression with broadcasting.
#[derive(Debug, Clone)]
pub struct Expression {
    statement: String,
    program: Vec<ExprNode>,
}

impl Expression {
    /// Parses `statement` and prepares its evaluation order.
    pub fn new(statement: &str) -> Result<Self, ExpressionError> {
        let tree = ExprTree::parse(statement)?;
        Ok(Self {
            statement: statement.to_string(),
            program: tree.reverse_polish(),
        })
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Builds a layer from a `pnnx.Expression` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        let statement = op
            .param("expr")
            .and_then(|p| p.as_str())
            .ok_or(ParseError::MissingExpr)?;
        let tree = ExprTree::parse(statement)?;
        if let (Some(index), Some(inputs)) = (tree.max_input(), op.num_inputs) {
            if index >= inputs {
                return Err(ParseError::ExpressionInput { index, inputs });
            }
        }
        Ok(Box::new(Self {
            statement: statement.to_string(),
            program: tree.reverse_polish(),
        }))
    }
}

impl Layer for Expression {
    fn name(&self) -> &'static str {
        "Expression"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        if inputs.is_empty() {
            return Err(InferError::InputEmpty { layer });
        }
        if outputs.is_empty() || outputs.iter().any(Option::is_none) {
            return Err(InferError::OutputEmpty { layer });
        }
        if inputs.iter().any(|t| t.is_empty()) {
            return Err(InferError::InputEmpty { layer });
        }

        let batch = outputs.len();
        let mut stack: Vec<Vec<SharedTensor>> = Vec::new();
        for node in &self.program {
            match *node {
                ExprNode::Input(index) => {
                    let operand = index
                        .checked_mul(batch)
                        .and_then(|start| start.checked_add(batch).map(|end| start..end))
                        .and_then(|range| inputs.get(range))
                        .ok_or(InferError::InputOutputSizeMismatch {
                            layer,
                            inputs: inputs.len(),
                            outputs: batch,
                        })?;
                    stack.push(operand.to_vec());
                }
                ExprNode::Add { .. } | ExprNode::Mul { .. } => {
                    let (rhs, lhs) = match (stack.pop(), stack.pop()) {
                        (Some(rhs), Some(lhs)) => (rhs, lhs),
                        _ => {
                            return Err(InferError::ShapeParameter {
                                layer,
                                detail: "operator is missing an operand".into(),
                            })
                        }
                    };
                    let combine: BinaryOp = match node {
                        ExprNode::Add { .. } => tensor_core::add,
                        _ => tensor_core::multiply,
                    };
                    let mut result = Vec::with_capacity(batch);
                    for (a, b) in lhs.iter().zip(&rhs) {
                        let value =
                            combine(a, b).map_err(|source| InferError::Tensor { layer, source })?;
                        result.push(Arc::new(value));
                    }
                    stack.push(result);
                }
            }
        }

        let result = match (stack.pop(), stack.is_empty()) {
            (Some(result), true) => result,
            _ => {
                return Err(InferError::ShapeParameter {
                    layer,
                    detail: format!("'{}' does not reduce to one value", self.statement),
                })
            }
        };
        for (slot, value) in outputs.iter_mut().zip(result) {
            let dims = slot
                .as_ref()
                .map(|t| t.dims())
                .ok_or(InferError::OutputEmpty { layer })?;
            if dims != value.dims() {
                return Err(InferError::OutputSize {
                    layer,
                    detail: format!(
                        "output tensor is {dims:?}, expression yields {:?}",
                        value.dims()
                    ),
                });
            }
            *slot = Some(value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::Parameter;
    use std::collections::BTreeMap;

    fn filled(value: f32, dims: [usize; 3]) -> SharedTensor {
        let mut t = Tensor::new(dims[0], dims[1], dims[2]);
        t.fill(value);
        Arc::new(t)
    }

    fn slots(count: usize, dims: [usize; 3]) -> Vec<Option<SharedTensor>> {
        (0..count).map(|_| Some(filled(0.0, dims))).collect()
    }

    #[test]
    fn test_add_mul_nested() {
        let dims = [3, 4, 4];
        let inputs = vec![filled(2.0, dims), filled(3.0, dims), filled(4.0, dims)];
        let mut outputs = slots(1, dims);
        let mut layer = Expression::new("add(@0,mul(@1,@2))").unwrap();
        layer.forward(&inputs, &mut outputs).unwrap();
        assert!(outputs[0].as_ref().unwrap().data().iter().all(|&x| x == 14.0));
    }

    #[test]
    fn test_mul_add_on_image() {
        let dims = [3, 224, 224];
        let inputs = vec![filled(2.0, dims), filled(3.0, dims), filled(4.0, dims)];
        let mut outputs = slots(1, dims);
        let mut layer = Expression::new("mul(@2,add(@0,@1))").unwrap();
        layer.forward(&inputs, &mut outputs).unwrap();
        assert!(outputs[0].as_ref().unwrap().data().iter().all(|&x| x == 20.0));
    }

    #[test]
    fn test_batched_operands() {
        let dims = [1, 2, 2];
        // Batch of 2: @0 = [1, 2], @1 = [10, 20].
        let inputs = vec![
            filled(1.0, dims),
            filled(2.0, dims),
            filled(10.0, dims),
            filled(20.0, dims),
        ];
        let mut outputs = slots(2, dims);
        let mut layer = Expression::new("add(@0, @1)").unwrap();
        layer.forward(&inputs, &mut outputs).unwrap();
        assert_eq!(outputs[0].as_ref().unwrap().data()[0], 11.0);
        assert_eq!(outputs[1].as_ref().unwrap().data()[0], 22.0);
    }

    #[test]
    fn test_broadcast_scalar_channel() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let input = Arc::new(Tensor::from_values(2, 2, 2, &values, true).unwrap());
        let scale = Arc::new(Tensor::from_values(2, 1, 1, &[10.0, 100.0], true).unwrap());
        let mut outputs = slots(1, [2, 2, 2]);
        let mut layer = Expression::new("mul(@0,@1)").unwrap();
        layer.forward(&[input, scale], &mut outputs).unwrap();
        assert_eq!(
            outputs[0].as_ref().unwrap().values(true),
            vec![10.0, 20.0, 30.0, 40.0, 500.0, 600.0, 700.0, 800.0]
        );
    }

    #[test]
    fn test_errors() {
        let dims = [1, 2, 2];
        let mut layer = Expression::new("add(@0,@1)").unwrap();
        assert!(matches!(
            layer.forward(&[], &mut slots(1, dims)),
            Err(InferError::InputEmpty { .. })
        ));
        assert!(matches!(
            layer.forward(&[filled(1.0, dims), filled(1.0, dims)], &mut [None]),
            Err(InferError::OutputEmpty { .. })
        ));
        assert!(matches!(
            layer.forward(&[filled(1.0, dims)], &mut slots(1, dims)),
            Err(InferError::InputOutputSizeMismatch { .. })
        ));
        assert!(matches!(
            layer.forward(&[filled(1.0, dims), filled(1.0, dims)], &mut slots(1, [1, 3, 3])),
            Err(InferError::OutputSize { .. })
        ));
        assert!(matches!(
            layer.forward(&[filled(1.0, dims), filled(1.0, [1, 3, 3])], &mut slots(1, dims)),
            Err(InferError::Tensor { .. })
        ));
    }

    #[test]
    fn test_from_operator() {
        let mut params = BTreeMap::new();
        let mut attrs = BTreeMap::new();
        let mut view = OperatorView::new("expr", "pnnx.Expression", &params, &mut attrs);
        assert!(matches!(
            Expression::from_operator(&mut view),
            Err(ParseError::MissingExpr)
        ));

        params.insert("expr".to_string(), Parameter::String("sub(@0,@1)".into()));
        let mut view = OperatorView::new("expr", "pnnx.Expression", &params, &mut attrs);
        assert!(matches!(
            Expression::from_operator(&mut view),
            Err(ParseError::Expression(ExpressionError::UnexpectedChar { .. }))
        ));

        params.insert("expr".to_string(), Parameter::String("mul(@0,@0)".into()));
        let mut view = OperatorView::new("expr", "pnnx.Expression", &params, &mut attrs);
        assert_eq!(Expression::from_operator(&mut view).unwrap().name(), "Expression");
    }

    #[test]
    fn test_huge_operand_index_is_an_error() {
        let dims = [1, 2, 2];
        let inputs: Vec<SharedTensor> = (0..4).map(|_| filled(1.0, dims)).collect();
        let mut layer = Expression::new(&format!("add(@0,@{})", usize::MAX)).unwrap();
        assert!(matches!(
            layer.forward(&inputs, &mut slots(2, dims)),
            Err(InferError::InputOutputSizeMismatch { inputs: 4, outputs: 2, .. })
        ));
    }

    #[test]
    fn test_from_operator_rejects_unknown_operand() {
        let mut params = BTreeMap::new();
        let mut attrs = BTreeMap::new();
        params.insert("expr".to_string(), Parameter::String("add(@0,@2)".into()));

        let mut view =
            OperatorView::new("expr", "pnnx.Expression", &params, &mut attrs).with_inputs(2);
        assert!(matches!(
            Expression::from_operator(&mut view),
            Err(ParseError::ExpressionInput { index: 2, inputs: 2 })
        ));

        let mut view =
            OperatorView::new("expr", "pnnx.Expression", &params, &mut attrs).with_inputs(3);
        assert!(Expression::from_operator(&mut view).is_ok());
    }
}
