// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use crate::layer::{check_batch, output_slot, pair_param};
use crate::{InferError, Layer, OperatorView, ParseError, SharedTensor};

/// Average pooling to a fixed output extent.
///
/// The window geometry is derived from the input:
/// `stride = in / out` and `window = in - (out - 1) * stride`.
#[derive(Debug, Clone)]
pub struct AdaptiveAveragePooling {
    output_h: usize,
    output_w: usize,
}

impl AdaptiveAveragePooling {
    pub fn new(output_h: usize, output_w: usize) -> Self {
        Self { output_h, output_w }
    }

    /// Builds a layer from an `nn.AdaptiveAvgPool2d` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        let (output_h, output_w) =
            pair_param(op, "output_size").ok_or(ParseError::MissingOutHW)?;
        Ok(Box::new(Self::new(output_h, output_w)))
    }
}

impl Layer for AdaptiveAveragePooling {
    fn name(&self) -> &'static str {
        "AdaptiveAveragePooling"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        check_batch(layer, inputs, outputs)?;
        let (out_h, out_w) = (self.output_h, self.output_w);
        if out_h == 0 || out_w == 0 {
            return Err(InferError::OutputSize {
                layer,
                detail: format!("output extent {out_h}x{out_w}"),
            });
        }

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [channels, in_h, in_w] = input.dims();
            let stride_h = in_h / out_h;
            let stride_w = in_w / out_w;
            if stride_h == 0 || stride_w == 0 {
                return Err(InferError::StrideParameter {
                    layer,
                    detail: format!("input {in_h}x{in_w} is smaller than output {out_h}x{out_w}"),
                });
            }
            let pool_h = in_h - (out_h - 1) * stride_h;
            let pool_w = in_w - (out_w - 1) * stride_w;
            let area = (pool_h * pool_w) as f32;

            let output = output_slot(layer, slot, [channels, out_h, out_w])?;
            for c in 0..channels {
                let plane = input.channel(c);
                let dst = output.channel_mut(c);
                for ow in 0..out_w {
                    for oh in 0..out_h {
                        let mut sum = 0.0f32;
                        for w in ow * stride_w..ow * stride_w + pool_w {
                            let column = &plane[w * in_h..(w + 1) * in_h];
                            sum += column[oh * stride_h..oh * stride_h + pool_h]
                                .iter()
                                .sum::<f32>();
                        }
                        dst[ow * out_h + oh] = sum / area;
                    }
                }
            }
        }
        Ok(())
    }
}
