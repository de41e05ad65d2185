// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution lowered to im2col + GEMM.
//!
//! For each group the input patches are unrolled into a `K x N` matrix,
//! `K = kernel_channels * kernel_h * kernel_w` and `N = out_h * out_w`.
//! Column `j = out_col * out_h + out_row` holds one receptive field, in
//! the same column-major tap order as the kernel planes, so a kernel's
//! physical buffer is directly one row of the left-hand matrix. The
//! product row for kernel `k` is exactly the column-major plane of output
//! channel `k`.

use tensor_core::{matmul, Tensor};

use crate::layer::{output_slot, pair_param, usize_param};
use crate::{InferError, Layer, OperatorView, ParamStore, ParseError, SharedTensor};

/// Grouped 2-D convolution with zero padding.
#[derive(Debug, Clone)]
pub struct Convolution {
    params: ParamStore,
    use_bias: bool,
    groups: usize,
    padding_h: usize,
    padding_w: usize,
    stride_h: usize,
    stride_w: usize,
    /// Row-major `kernel_count x K` matrix, rebuilt after weights change.
    kernel_matrix: Option<Vec<f32>>,
}

impl Convolution {
    /// Creates a convolution with zeroed weights.
    ///
    /// `in_channel` is the full input channel count; each kernel spans
    /// `in_channel / groups` channels.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        output_channel: usize,
        in_channel: usize,
        kernel_h: usize,
        kernel_w: usize,
        padding_h: usize,
        padding_w: usize,
        stride_h: usize,
        stride_w: usize,
        groups: usize,
        use_bias: bool,
    ) -> Self {
        let kernel_channel = if groups > 1 {
            in_channel / groups
        } else {
            in_channel
        };
        let mut params = ParamStore::new();
        params.init_weight_param(output_channel, kernel_channel, kernel_h, kernel_w);
        if use_bias {
            params.init_bias_param(output_channel, 1, 1, 1);
        }
        Self {
            params,
            use_bias,
            groups,
            padding_h,
            padding_w,
            stride_h,
            stride_w,
            kernel_matrix: None,
        }
    }

    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn use_bias(&self) -> bool {
        self.use_bias
    }

    /// Builds a layer from an `nn.Conv2d` operator.
    pub fn from_operator(op: &mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError> {
        match op.param("dilation").and_then(|p| p.as_int_array()) {
            Some([1, 1]) => {}
            _ => return Err(ParseError::MissingDilation),
        }
        let in_channel = usize_param(op, "in_channels").ok_or(ParseError::MissingInChannel)?;
        let out_channel = usize_param(op, "out_channels").ok_or(ParseError::MissingOutChannel)?;
        let (padding_h, padding_w) =
            pair_param(op, "padding").ok_or(ParseError::MissingPadding)?;
        let use_bias = op
            .param("bias")
            .and_then(|p| p.as_bool())
            .ok_or(ParseError::MissingUseBias)?;
        let (stride_h, stride_w) = pair_param(op, "stride").ok_or(ParseError::MissingStride)?;
        let (kernel_h, kernel_w) =
            pair_param(op, "kernel_size").ok_or(ParseError::MissingKernel)?;
        if op.param("padding_mode").and_then(|p| p.as_str()) != Some("zeros") {
            return Err(ParseError::MissingPaddingMode);
        }
        let groups = usize_param(op, "groups")
            .filter(|&g| g > 0)
            .ok_or(ParseError::MissingGroups)?;

        let mut layer = Self::new(
            out_channel,
            in_channel,
            kernel_h,
            kernel_w,
            padding_h,
            padding_w,
            stride_h,
            stride_w,
            groups,
            use_bias,
        );

        if use_bias {
            let bias = op
                .attribute_mut("bias")
                .filter(|a| a.shape.first() == Some(&out_channel))
                .ok_or(ParseError::AttrMissingBias)?;
            let values = bias.take_f32().map_err(|_| ParseError::AttrMissingBias)?;
            layer.set_bias(&values)?;
        }

        let weight = op
            .attribute_mut("weight")
            .filter(|a| !a.shape.is_empty())
            .ok_or(ParseError::AttrMissingWeight)?;
        let values = weight.take_f32().map_err(|_| ParseError::AttrMissingWeight)?;
        layer.set_weights(&values)?;
        layer.kernel_matrix = Some(layer.build_kernel_matrix());
        Ok(Box::new(layer))
    }

    fn build_kernel_matrix(&self) -> Vec<f32> {
        self.params
            .weights()
            .iter()
            .flat_map(|k| k.data().iter().copied())
            .collect()
    }

    /// Validates the weights and returns `[kernel_channels, kernel_h, kernel_w]`.
    fn kernel_dims(&self) -> Result<[usize; 3], InferError> {
        let layer = self.name();
        let weights = self.params.weights();
        let first = weights.first().ok_or(InferError::WeightParameter {
            layer,
            detail: "the number of kernels is zero".into(),
        })?;
        if self.use_bias && self.params.bias().len() != weights.len() {
            return Err(InferError::BiasParameter {
                layer,
                detail: format!(
                    "{} bias tensors for {} kernels",
                    self.params.bias().len(),
                    weights.len()
                ),
            });
        }
        if self.stride_h == 0 || self.stride_w == 0 {
            return Err(InferError::StrideParameter {
                layer,
                detail: format!("stride ({}, {})", self.stride_h, self.stride_w),
            });
        }
        let dims = first.dims();
        if dims.contains(&0) || weights.iter().any(|k| k.dims() != dims) {
            return Err(InferError::WeightParameter {
                layer,
                detail: "kernels must share one non-empty shape".into(),
            });
        }
        Ok(dims)
    }
}

/// Unrolls the receptive fields of channels `first..first + channels`.
#[allow(clippy::too_many_arguments)]
fn im2col(
    input: &Tensor,
    first: usize,
    channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    [padding_h, padding_w]: [usize; 2],
    [stride_h, stride_w]: [usize; 2],
    [out_h, out_w]: [usize; 2],
) -> Vec<f32> {
    let (in_h, in_w) = (input.rows(), input.cols());
    let n = out_h * out_w;
    let mut col = vec![0.0f32; channels * kernel_h * kernel_w * n];
    for c in 0..channels {
        let plane = input.channel(first + c);
        for kw in 0..kernel_w {
            for kh in 0..kernel_h {
                let row = c * kernel_h * kernel_w + kw * kernel_h + kh;
                let dst = &mut col[row * n..(row + 1) * n];
                for ow in 0..out_w {
                    let w = ow * stride_w + kw;
                    if w < padding_w || w - padding_w >= in_w {
                        continue;
                    }
                    let src_col = (w - padding_w) * in_h;
                    for oh in 0..out_h {
                        let h = oh * stride_h + kh;
                        if h < padding_h || h - padding_h >= in_h {
                            continue;
                        }
                        dst[ow * out_h + oh] = plane[src_col + h - padding_h];
                    }
                }
            }
        }
    }
    col
}

impl Layer for Convolution {
    fn name(&self) -> &'static str {
        "Convolution"
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
        if inputs.len() != outputs.len() {
            return Err(InferError::InputOutputSizeMismatch {
                layer,
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }
        let [kernel_c, kernel_h, kernel_w] = self.kernel_dims()?;
        let kernel_count = self.params.weights().len();
        if self.kernel_matrix.is_none() {
            self.kernel_matrix = Some(self.build_kernel_matrix());
        }
        let kernels = self.kernel_matrix.as_deref().unwrap_or_default();
        let bias: Vec<f32> = if self.use_bias {
            self.params
                .bias()
                .iter()
                .map(|b| b.data().first().copied().unwrap_or(0.0))
                .collect()
        } else {
            Vec::new()
        };

        for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
            if input.is_empty() {
                return Err(InferError::InputEmpty { layer });
            }
            let [in_c, in_h, in_w] = input.dims();
            let padded_h = in_h + 2 * self.padding_h;
            let padded_w = in_w + 2 * self.padding_w;
            if padded_h < kernel_h || padded_w < kernel_w {
                return Err(InferError::OutputSize {
                    layer,
                    detail: format!(
                        "padded input {padded_h}x{padded_w} is smaller than kernel \
                         {kernel_h}x{kernel_w}"
                    ),
                });
            }
            let out_h = (padded_h - kernel_h) / self.stride_h + 1;
            let out_w = (padded_w - kernel_w) / self.stride_w + 1;

            let groups = self.groups.max(1);
            if in_c % groups != 0 || kernel_count % groups != 0 {
                return Err(InferError::ChannelParameter {
                    layer,
                    detail: format!(
                        "{groups} groups do not divide {in_c} channels and {kernel_count} kernels"
                    ),
                });
            }
            if in_c / groups != kernel_c {
                return Err(InferError::ChannelParameter {
                    layer,
                    detail: format!(
                        "{} input channels per group but kernels have {kernel_c}",
                        in_c / groups
                    ),
                });
            }

            let kernels_per_group = kernel_count / groups;
            let k = kernel_c * kernel_h * kernel_w;
            let n = out_h * out_w;
            let output = output_slot(layer, slot, [kernel_count, out_h, out_w])?;
            let mut product = vec![0.0f32; kernels_per_group * n];
            for g in 0..groups {
                let col = im2col(
                    input,
                    g * kernel_c,
                    kernel_c,
                    kernel_h,
                    kernel_w,
                    [self.padding_h, self.padding_w],
                    [self.stride_h, self.stride_w],
                    [out_h, out_w],
                );
                let rows = &kernels[g * kernels_per_group * k..(g + 1) * kernels_per_group * k];
                matmul(rows, &col, &mut product, kernels_per_group, k, n)
                    .map_err(|source| InferError::Tensor { layer, source })?;
                for kernel in 0..kernels_per_group {
                    let channel = g * kernels_per_group + kernel;
                    let offset = bias.get(channel).copied().unwrap_or(0.0);
                    let dst = output.channel_mut(channel);
                    for (d, s) in dst.iter_mut().zip(&product[kernel * n..(kernel + 1) * n]) {
                        *d = s + offset;
                    }
                }
            }
        }
        Ok(())
    }

    fn params(&self) -> Option<&ParamStore> {
        Some(&self.params)
    }

    /// Any mutable access may change the weights, so it drops the kernel matrix.
    fn params_mut(&mut self) -> Option<&mut ParamStore> {
        self.kernel_matrix = None;
        Some(&mut self.params)
    }
}
