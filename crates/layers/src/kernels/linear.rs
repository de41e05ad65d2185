// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected layer: `y = x · Wᵗ + b`.

use tensor_core::matmul;

use crate::layer::{check_batch, output_slot};
use crate::{InferError, Layer, OperatorView, ParamStore, ParseError, SharedTensor};

/// Dense layer over the last logical dimension of its input.
///
/// The weight is a single `(1, out_features, in_features)` tensor and the
/// optional bias a single `(1, 1, out_features)` tensor. An input whose raw
/// shape is `[n]` is one sample of `n` features; `[r, w]` is `r` samples of
/// `w` features. The output is `(1, samples, out_features)`.
#[derive(Debug, Clone)]
pub struct Linear {
    params: ParamStore,
    in_features: usize,
    out_features: usize,
    use_bias: bool,
}

impl Linear {
    pub fn new(in_features: usize, out_features: usize, use_bias: bool) -> Self {
        let mut params = ParamStore::new();
        params.init_weight_param(1, 1, out_features, in_features);
        if use_bias {
            params.init_bias_param(1, 1, 1, out_features);
        }
        Self {
            params,
            in_features,
            out_features,
            use_bias,
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Builds a layer from an `nn.Linear` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        let use_bias = op
            .param("bias")
            .and_then(|p| p.as_bool())
            .ok_or(ParseError::MissingUseBias)?;
        let shape = op
            .attribute("weight")
            .map(|a| a.shape.clone())
            .ok_or(ParseError::AttrMissingWeight)?;
        if use_bias && op.attribute("bias").is_none() {
            return Err(ParseError::AttrMissingBias);
        }
        let (out_features, in_features) = match shape.as_slice() {
            [out, inp, ..] if *out > 0 && *inp > 0 => (*out, *inp),
            _ => return Err(ParseError::AttrMissingOutFeatures),
        };

        let mut layer = Self::new(in_features, out_features, use_bias);
        if use_bias {
            let values = op
                .attribute_mut("bias")
                .ok_or(ParseError::AttrMissingBias)?
                .take_f32()
                .map_err(|_| ParseError::AttrMissingBias)?;
            layer.set_bias(&values)?;
        }
        let values = op
            .attribute_mut("weight")
            .ok_or(ParseError::AttrMissingWeight)?
            .take_f32()
            .map_err(|_| ParseError::AttrMissingWeight)?;
        layer.set_weights(&values)?;
        Ok(Box::new(layer))
    }
}

impl Layer for Linear {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        check_batch(layer, inputs, outputs)?;
        let weights = self.params.weights();
        if weights.len() != 1 {
            return Err(InferError::WeightParameter {
                layer,
                detail: format!("expected one weight tensor, found {}", weights.len()),
            });
        }
        let bias = self.params.bias();
        if self.use_bias && bias.len() != weights.len() {
            return Err(InferError::BiasParameter {
                layer,
                detail: format!("expected one bias tensor, found {}", bias.len()),
            });
        }
        let weight = &weights[0];
        if weight.dims() != [1, self.out_features, self.in_features] {
            return Err(InferError::WeightParameter {
                layer,
                detail: format!(
                    "weight is {:?}, expected [1, {}, {}]",
                    weight.dims(),
                    self.out_features,
                    self.in_features
                ),
            });
        }

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let (samples, features) = match *input.raw_shape().dims() {
                [n] => (1, n),
                [r, w] => (r, w),
                [..] if input.channels() == 1 => (input.rows(), input.cols()),
                _ => {
                    return Err(InferError::ShapeParameter {
                        layer,
                        detail: format!(
                            "input {:?} must have a single channel",
                            input.dims()
                        ),
                    })
                }
            };
            if features != self.in_features {
                return Err(InferError::ShapeParameter {
                    layer,
                    detail: format!(
                        "input has {features} features, layer expects {}",
                        self.in_features
                    ),
                });
            }

            // The column-major weight buffer is Wᵗ in row-major order.
            let x = input.values(true);
            let mut y = vec![0.0f32; samples * self.out_features];
            matmul(&x, weight.data(), &mut y, samples, features, self.out_features)
                .map_err(|source| InferError::Tensor { layer, source })?;
            if let Some(b) = bias.first().filter(|_| self.use_bias) {
                for row in y.chunks_exact_mut(self.out_features.max(1)) {
                    for (v, bias) in row.iter_mut().zip(b.data()) {
                        *v += bias;
                    }
                }
            }

            let output = output_slot(layer, slot, [1, samples, self.out_features])?;
            output
                .fill_values(&y, true)
                .map_err(|source| InferError::Tensor { layer, source })?;
        }
        Ok(())
    }

    fn params(&self) -> Option<&ParamStore> {
        Some(&self.params)
    }

    fn params_mut(&mut self) -> Option<&mut ParamStore> {
        Some(&mut self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{Attribute, Parameter};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tensor_core::Tensor;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    fn layer_2x3(use_bias: bool) -> Linear {
        // W = [[1, 2, 3], [4, 5, 6]]
        let mut linear = Linear::new(3, 2, use_bias);
        linear
            .set_weights(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        if use_bias {
            linear.set_bias(&[0.5, -0.5]).unwrap();
        }
        linear
    }

    #[test]
    fn test_linear_vector_input() {
        let mut linear = layer_2x3(false);
        let input = Tensor::from_values(1, 1, 3, &[1.0, 0.0, -1.0], true).unwrap();
        let mut outputs = vec![None];
        linear.forward(&[Arc::new(input)], &mut outputs).unwrap();
        let out = outputs[0].as_ref().unwrap();
        assert_eq!(out.dims(), [1, 1, 2]);
        assert!(approx_eq(out.at(0, 0, 0), -2.0));
        assert!(approx_eq(out.at(0, 0, 1), -2.0));
    }

    #[test]
    fn test_linear_matrix_input_with_bias() {
        let mut linear = layer_2x3(true);
        let input =
            Tensor::from_values(1, 2, 3, &[1.0, 1.0, 1.0, 0.0, 1.0, 0.0], true).unwrap();
        let mut outputs = vec![None];
        linear.forward(&[Arc::new(input)], &mut outputs).unwrap();
        let out = outputs[0].as_ref().unwrap();
        assert_eq!(out.dims(), [1, 2, 2]);
        assert_eq!(out.values(true), vec![6.5, 14.5, 2.5, 4.5]);
    }

    #[test]
    fn test_linear_flattened_input() {
        let mut linear = layer_2x3(false);
        let mut input = Tensor::from_values(3, 1, 1, &[1.0, 2.0, 3.0], true).unwrap();
        input.flatten(true);
        let mut outputs = vec![None];
        linear.forward(&[Arc::new(input)], &mut outputs).unwrap();
        assert_eq!(outputs[0].as_ref().unwrap().values(true), vec![14.0, 32.0]);
    }

    #[test]
    fn test_linear_errors() {
        let mut linear = layer_2x3(false);
        let wrong = Arc::new(Tensor::new(1, 1, 4));
        assert!(matches!(
            linear.forward(&[wrong], &mut [None]),
            Err(InferError::ShapeParameter { .. })
        ));
        assert!(matches!(
            linear.forward(&[], &mut []),
            Err(InferError::InputEmpty { .. })
        ));
        let multi = Arc::new(Tensor::new(2, 2, 3));
        assert!(matches!(
            linear.forward(&[multi], &mut [None]),
            Err(InferError::ShapeParameter { .. })
        ));
    }

    #[test]
    fn test_linear_from_operator() {
        let mut params = BTreeMap::new();
        params.insert("bias".to_string(), Parameter::Bool(true));
        let mut attrs = BTreeMap::new();
        attrs.insert(
            "weight".to_string(),
            Attribute::from_f32(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        );
        let mut view = OperatorView::new("fc", "nn.Linear", &params, &mut attrs);
        assert!(matches!(
            Linear::from_operator(&mut view),
            Err(ParseError::AttrMissingBias)
        ));

        attrs.insert("bias".to_string(), Attribute::from_f32(vec![2], &[1.0, 1.0]));
        let mut view = OperatorView::new("fc", "nn.Linear", &params, &mut attrs);
        let mut layer = Linear::from_operator(&mut view).unwrap();
        assert_eq!(layer.weights()[0].dims(), [1, 2, 3]);

        let input = Tensor::from_values(1, 1, 3, &[1.0, 1.0, 1.0], true).unwrap();
        let mut outputs = vec![None];
        layer.forward(&[Arc::new(input)], &mut outputs).unwrap();
        assert_eq!(outputs[0].as_ref().unwrap().values(true), vec![7.0, 16.0]);
    }

    #[test]
    fn test_linear_from_operator_needs_two_dims() {
        let mut params = BTreeMap::new();
        params.insert("bias".to_string(), Parameter::Bool(false));
        let mut attrs = BTreeMap::new();
        attrs.insert("weight".to_string(), Attribute::from_f32(vec![6], &[0.0; 6]));
        let mut view = OperatorView::new("fc", "nn.Linear", &params, &mut attrs);
        assert!(matches!(
            Linear::from_operator(&mut view),
            Err(ParseError::AttrMissingOutFeatures)
        ));
    }
}
