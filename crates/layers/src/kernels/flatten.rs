// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use tensor_core::Tensor;

use crate::layer::check_batch;
use crate::{InferError, Layer, OperatorView, ParseError, SharedTensor};

/// Collapses a contiguous range of NCHW dimensions.
///
/// Dimensions count the implicit batch axis as `0`, so `start_dim = 1,
/// end_dim = -1` flattens each sample to a vector. Each output slot is
/// replaced by a reshaped copy of its input.
#[derive(Debug, Clone)]
pub struct Flatten {
    start_dim: i32,
    end_dim: i32,
}

const TOTAL_DIMS: i32 = 4;

impl Flatten {
    pub fn new(start_dim: i32, end_dim: i32) -> Self {
        Self { start_dim, end_dim }
    }

    /// Builds a layer from a `torch.flatten` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        let end_dim = op
            .param("end_dim")
            .and_then(|p| p.as_int())
            .ok_or(ParseError::MissingDim)?;
        let start_dim = op
            .param("start_dim")
            .and_then(|p| p.as_int())
            .ok_or(ParseError::MissingDim)?;
        Ok(Box::new(Self::new(start_dim, end_dim)))
    }

    fn resolved(&self) -> Result<(usize, usize), InferError> {
        let wrap = |d: i32| if d < 0 { d + TOTAL_DIMS } else { d };
        let (start, end) = (wrap(self.start_dim), wrap(self.end_dim));
        if start < 1 || end > 3 || end <= start {
            return Err(InferError::DimensionParameter {
                layer: self.name(),
                detail: format!("cannot flatten dims {start}..={end} of an NCHW tensor"),
            });
        }
        // Both bounds are in 1..=3 here.
        Ok((start as usize, end as usize))
    }
}

impl Layer for Flatten {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        check_batch(layer, inputs, outputs)?;
        let (start, end) = self.resolved()?;

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [channels, rows, cols] = input.dims();
            let shape = match (start, end) {
                (1, 3) => vec![channels * rows * cols],
                (2, 3) => vec![channels, rows * cols],
                _ => vec![channels * rows, cols],
            };
            let mut output = Tensor::clone(input);
            output
                .reshape(&shape, true)
                .map_err(|source| InferError::Tensor { layer, source })?;
            *slot = Some(Arc::new(output));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::Parameter;
    use std::collections::BTreeMap;

    fn seq(channels: usize, rows: usize, cols: usize) -> SharedTensor {
        let values: Vec<f32> = (1..=channels * rows * cols).map(|x| x as f32).collect();
        Arc::new(Tensor::from_values(channels, rows, cols, &values, true).unwrap())
    }

    fn run(start: i32, end: i32, input: SharedTensor) -> SharedTensor {
        let mut outputs = vec![None];
        Flatten::new(start, end).forward(&[input], &mut outputs).unwrap();
        outputs.remove(0).unwrap()
    }

    #[test]
    fn test_flatten_all() {
        let input = seq(2, 3, 4);
        let out = run(1, -1, Arc::clone(&input));
        assert_eq!(out.dims(), [1, 24, 1]);
        assert_eq!(out.raw_shape().dims(), &[24]);
        assert_eq!(out.values(true), input.values(true));
    }

    #[test]
    fn test_flatten_spatial() {
        let out = run(2, 3, seq(2, 3, 4));
        assert_eq!(out.dims(), [1, 2, 12]);
        assert_eq!(out.at(0, 1, 0), 13.0);
    }

    #[test]
    fn test_flatten_channels_and_rows() {
        let out = run(1, 2, seq(2, 3, 4));
        assert_eq!(out.dims(), [1, 6, 4]);
        assert_eq!(out.at(0, 5, 3), 24.0);
    }

    #[test]
    fn test_flatten_replaces_existing_slot() {
        let mut outputs = vec![Some(Arc::new(Tensor::new(5, 5, 5)))];
        Flatten::new(1, 3)
            .forward(&[seq(1, 2, 2)], &mut outputs)
            .unwrap();
        assert_eq!(outputs[0].as_ref().unwrap().dims(), [1, 4, 1]);
    }

    #[test]
    fn test_flatten_invalid_dims() {
        for (start, end) in [(0, 3), (2, 2), (3, 1), (1, 4)] {
            let mut layer = Flatten::new(start, end);
            assert!(
                matches!(
                    layer.forward(&[seq(1, 2, 2)], &mut [None]),
                    Err(InferError::DimensionParameter { .. })
                ),
                "({start}, {end}) accepted"
            );
        }
    }

    #[test]
    fn test_flatten_from_operator() {
        let mut params = BTreeMap::new();
        params.insert("start_dim".to_string(), Parameter::Int(1));
        let mut attrs = BTreeMap::new();
        let mut view = OperatorView::new("flat", "torch.flatten", &params, &mut attrs);
        assert!(matches!(
            Flatten::from_operator(&mut view),
            Err(ParseError::MissingDim)
        ));
        params.insert("end_dim".to_string(), Parameter::Int(-1));
        let mut view = OperatorView::new("flat", "torch.flatten", &params, &mut attrs);
        assert!(Flatten::from_operator(&mut view).is_ok());
    }
}
