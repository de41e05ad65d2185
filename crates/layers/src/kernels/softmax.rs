// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use crate::layer::{check_batch, output_slot};
use crate::{InferError, Layer, OperatorView, ParseError, SharedTensor};

/// Softmax along one axis of the input's raw shape.
///
/// The raw shape is padded with trailing `1`s to rank 3 and split into
/// `outer x axis x inner` around `dim`.
#[derive(Debug, Clone)]
pub struct Softmax {
    dim: i32,
}

impl Softmax {
    pub fn new(dim: i32) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> i32 {
        self.dim
    }

    /// Builds a layer from an `nn.Softmax` or `F.softmax` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        let dim = op
            .param("dim")
            .and_then(|p| p.as_int())
            .ok_or(ParseError::MissingDim)?;
        Ok(Box::new(Self::new(dim)))
    }

    fn resolve_dim(&self, rank: usize) -> Option<usize> {
        let dim = if self.dim < 0 {
            i64::from(self.dim) + rank as i64
        } else {
            i64::from(self.dim)
        };
        let dim = usize::try_from(dim).ok()?;
        (dim < 3 && dim <= rank).then_some(dim)
    }
}

impl Layer for Softmax {
    fn name(&self) -> &'static str {
        "Softmax"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        check_batch(layer, inputs, outputs)?;

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let raw = input.raw_shape();
            let dim = self
                .resolve_dim(raw.rank())
                .ok_or_else(|| InferError::DimensionParameter {
                    layer,
                    detail: format!("dim {} for raw shape {raw}, expected 0..=2", self.dim),
                })?;
            let extents = raw.extended3().ok_or_else(|| InferError::ShapeParameter {
                layer,
                detail: format!("raw shape {raw} has more than three dimensions"),
            })?;
            let outer: usize = extents[..dim].iter().product();
            let axis = extents[dim];
            let inner: usize = extents[dim + 1..].iter().product();

            let values = input.values(true);
            let mut result = vec![0.0f32; values.len()];
            tensor_core::softmax(&values, &mut result, outer, axis, inner)
                .map_err(|source| InferError::Tensor { layer, source })?;

            let output = output_slot(layer, slot, input.dims())?;
            output
                .fill_values(&result, true)
                .map_err(|source| InferError::Tensor { layer, source })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::Parameter;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tensor_core::Tensor;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn run(dim: i32, input: Tensor) -> Tensor {
        let mut layer = Softmax::new(dim);
        let mut outputs = vec![None];
        layer.forward(&[Arc::new(input)], &mut outputs).unwrap();
        outputs.remove(0).map(|t| (*t).clone()).unwrap()
    }

    #[test]
    fn test_softmax_vector_sums_to_one() {
        let input = Tensor::from_values(1, 1, 4, &[1.0, 2.0, 3.0, 4.0], true).unwrap();
        let out = run(0, input);
        let sum: f32 = out.data().iter().sum();
        assert!(approx_eq(sum, 1.0));
        assert!(out.at(0, 0, 3) > out.at(0, 0, 0));
        assert!(approx_eq(out.at(0, 0, 0), 0.032058604));
    }

    #[test]
    fn test_softmax_shift_invariant() {
        let values = [0.5, -1.0, 2.0, 4.0];
        let shifted: Vec<f32> = values.iter().map(|x| x + 100.0).collect();
        let a = run(-1, Tensor::from_values(1, 1, 4, &values, true).unwrap());
        let b = run(-1, Tensor::from_values(1, 1, 4, &shifted, true).unwrap());
        for (x, y) in a.data().iter().zip(b.data()) {
            assert!(approx_eq(*x, *y));
        }
    }

    #[test]
    fn test_softmax_matrix_rows() {
        // raw shape [2, 3]; dim 1 normalises each row.
        let input = Tensor::from_values(1, 2, 3, &[1.0, 1.0, 1.0, 0.0, 0.0, 10.0], true).unwrap();
        let out = run(1, input);
        for r in 0..2 {
            let sum: f32 = (0..3).map(|w| out.at(0, r, w)).sum();
            assert!(approx_eq(sum, 1.0));
        }
        assert!(approx_eq(out.at(0, 0, 1), 1.0 / 3.0));
        assert!(out.at(0, 1, 2) > 0.99);
    }

    #[test]
    fn test_softmax_matrix_columns() {
        let input = Tensor::from_values(1, 2, 2, &[1.0, 5.0, 1.0, 5.0], true).unwrap();
        let out = run(0, input);
        assert!(approx_eq(out.at(0, 0, 0), 0.5));
        assert!(approx_eq(out.at(0, 1, 1), 0.5));
    }

    #[test]
    fn test_softmax_after_reshape() {
        let mut input = Tensor::new(2, 2, 2);
        input.fill(3.0);
        input.reshape(&[2, 4], true).unwrap();
        let out = run(1, input);
        assert!(out.data().iter().all(|&x| approx_eq(x, 0.25)));
    }

    #[test]
    fn test_softmax_invalid_dim() {
        let input = Arc::new(Tensor::new(1, 1, 4));
        let mut layer = Softmax::new(3);
        assert!(matches!(
            layer.forward(&[Arc::clone(&input)], &mut [None]),
            Err(InferError::DimensionParameter { .. })
        ));
        let mut layer = Softmax::new(-3);
        assert!(matches!(
            layer.forward(&[input], &mut [None]),
            Err(InferError::DimensionParameter { .. })
        ));
    }

    #[test]
    fn test_softmax_from_operator() {
        let mut params = BTreeMap::new();
        let mut attrs = BTreeMap::new();
        let mut view = OperatorView::new("sm", "F.softmax", &params, &mut attrs);
        assert!(matches!(
            Softmax::from_operator(&mut view),
            Err(ParseError::MissingDim)
        ));
        params.insert("dim".to_string(), Parameter::Int(-1));
        let mut view = OperatorView::new("sm", "F.softmax", &params, &mut attrs);
        assert_eq!(Softmax::from_operator(&mut view).unwrap().name(), "Softmax");
    }
}
