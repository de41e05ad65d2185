// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

use crate::layer::{check_batch, output_slot, pair_param};
use crate::{InferError, Layer, OperatorView, ParseError, SharedTensor};

/// 2-D max pooling. Padded taps never win.
#[derive(Debug, Clone)]
pub struct MaxPooling {
    padding_h: usize,
    padding_w: usize,
    pooling_h: usize,
    pooling_w: usize,
    stride_h: usize,
    stride_w: usize,
}

impl MaxPooling {
    pub fn new(
        padding_h: usize,
        padding_w: usize,
        pooling_h: usize,
        pooling_w: usize,
        stride_h: usize,
        stride_w: usize,
    ) -> Self {
        Self {
            padding_h,
            padding_w,
            pooling_h,
            pooling_w,
            stride_h,
            stride_w,
        }
    }

    /// Builds a layer from an `nn.MaxPool2d` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        let (stride_h, stride_w) = pair_param(op, "stride").ok_or(ParseError::MissingStride)?;
        let (padding_h, padding_w) =
            pair_param(op, "padding").ok_or(ParseError::MissingPadding)?;
        let (pooling_h, pooling_w) =
            pair_param(op, "kernel_size").ok_or(ParseError::MissingKernel)?;
        Ok(Box::new(Self::new(
            padding_h, padding_w, pooling_h, pooling_w, stride_h, stride_w,
        )))
    }
}

impl Layer for MaxPooling {
    fn name(&self) -> &'static str {
        "MaxPooling"
    }

    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError> {
        let layer = self.name();
        check_batch(layer, inputs, outputs)?;
        if self.pooling_h == 0 || self.pooling_w == 0 || self.stride_h == 0 || self.stride_w == 0
        {
            return Err(InferError::StrideParameter {
                layer,
                detail: format!(
                    "pool {}x{} stride {}x{}",
                    self.pooling_h, self.pooling_w, self.stride_h, self.stride_w
                ),
            });
        }

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            let [channels, in_h, in_w] = input.dims();
            let padded_h = in_h + 2 * self.padding_h;
            let padded_w = in_w + 2 * self.padding_w;
            if padded_h < self.pooling_h || padded_w < self.pooling_w {
                return Err(InferError::OutputSize {
                    layer,
                    detail: format!(
                        "padded input {padded_h}x{padded_w} is smaller than the {}x{} window",
                        self.pooling_h, self.pooling_w
                    ),
                });
            }
            let out_h = (padded_h - self.pooling_h) / self.stride_h + 1;
            let out_w = (padded_w - self.pooling_w) / self.stride_w + 1;

            let output = output_slot(layer, slot, [channels, out_h, out_w])?;
            for c in 0..channels {
                let plane = input.channel(c);
                let dst = output.channel_mut(c);
                for ow in 0..out_w {
                    for oh in 0..out_h {
                        let mut max = f32::MIN;
                        for kw in 0..self.pooling_w {
                            let w = ow * self.stride_w + kw;
                            if w < self.padding_w || w - self.padding_w >= in_w {
                                continue;
                            }
                            let src_col = (w - self.padding_w) * in_h;
                            for kh in 0..self.pooling_h {
                                let h = oh * self.stride_h + kh;
                                if h < self.padding_h || h - self.padding_h >= in_h {
                                    continue;
                                }
                                max = max.max(plane[src_col + h - self.padding_h]);
                            }
                        }
                        dst[ow * out_h + oh] = max;
                    }
                }
            }
        }
        Ok(())
    }
}
