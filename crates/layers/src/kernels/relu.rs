// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use crate::layer::{check_batch, output_slot};
use crate::{InferError, Layer, OperatorView, ParseError, SharedTensor};

/// `max(x, 0)` elementwise.
#[derive(Debug, Clone, Default)]
pub struct Relu;

impl Relu {
    pub fn new() -> Self {
        Self
    }

    /// Builds a layer from an `nn.ReLU` operator.
    pub fn from_operator(_op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        Ok(Box::new(Self))
    }
}

impl Layer for Relu {
    fn name(&self) -> &'static str {
        "ReLU"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        check_batch(layer, inputs, outputs)?;
        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let output = output_slot(layer, slot, input.dims())?;
            tensor_core::relu(input, output)
                .map_err(|source| InferError::Tensor { layer, source })?;
        }
        Ok(())
    }
}
