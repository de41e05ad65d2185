// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for layer construction and execution.

use tensor_core::TensorError;

/// A failure raised by a layer's forward pass.
#[derive(Debug, thiserror::Error)]
pub enum InferError {
    /// No input tensors, or an input slot was empty.
    #[error("{layer}: input tensor array is empty")]
    InputEmpty { layer: &'static str },

    /// The weight tensors are missing or inconsistent.
    #[error("{layer}: weight parameter error: {detail}")]
    WeightParameter { layer: &'static str, detail: String },

    /// The bias tensors do not match the weights.
    #[error("{layer}: bias parameter error: {detail}")]
    BiasParameter { layer: &'static str, detail: String },

    /// A stride or window extent is zero.
    #[error("{layer}: stride parameter error: {detail}")]
    StrideParameter { layer: &'static str, detail: String },

    /// A dimension argument is out of range.
    #[error("{layer}: dimension parameter error: {detail}")]
    DimensionParameter { layer: &'static str, detail: String },

    /// `inputs.len()` and `outputs.len()` differ.
    #[error("{layer}: {inputs} inputs but {outputs} outputs")]
    InputOutputSizeMismatch {
        layer: &'static str,
        inputs: usize,
        outputs: usize,
    },

    /// The computed output extent is empty, or a provided output tensor has the wrong shape.
    #[error("{layer}: output size error: {detail}")]
    OutputSize { layer: &'static str, detail: String },

    /// An input tensor's shape is incompatible with the layer configuration.
    #[error("{layer}: shape parameter error: {detail}")]
    ShapeParameter { layer: &'static str, detail: String },

    /// Channel counts are incompatible with the weights or groups.
    #[error("{layer}: channel parameter error: {detail}")]
    ChannelParameter { layer: &'static str, detail: String },

    /// The output tensor array is empty, or an output slot was not allocated.
    #[error("{layer}: output tensor array is empty")]
    OutputEmpty { layer: &'static str },

    /// A tensor operation inside the layer failed.
    #[error("{layer}: {source}")]
    Tensor {
        layer: &'static str,
        #[source]
        source: TensorError,
    },
}

/// Why a layer factory rejected an operator's configuration.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing or malformed stride parameter")]
    MissingStride,
    #[error("missing or malformed padding parameter")]
    MissingPadding,
    #[error("missing or malformed kernel_size parameter")]
    MissingKernel,
    #[error("missing or malformed bias parameter")]
    MissingUseBias,
    #[error("missing or malformed in_channels parameter")]
    MissingInChannel,
    #[error("missing or malformed out_channels parameter")]
    MissingOutChannel,
    #[error("missing or malformed dim parameter")]
    MissingDim,
    #[error("missing or malformed expr parameter")]
    MissingExpr,
    #[error("missing or malformed output_size parameter")]
    MissingOutHW,
    #[error("missing or malformed groups parameter")]
    MissingGroups,
    #[error("missing or unsupported dilation parameter")]
    MissingDilation,
    #[error("missing or unsupported padding_mode parameter")]
    MissingPaddingMode,
    #[error("missing or malformed bias attribute")]
    AttrMissingBias,
    #[error("missing or malformed weight attribute")]
    AttrMissingWeight,
    #[error("weight attribute does not describe out_features")]
    AttrMissingOutFeatures,

    /// The decoded weights could not be installed.
    #[error("cannot set parameters: {0}")]
    Params(#[from] ParamError),

    /// The expression references an operand the operator does not have.
    #[error("expression references @{index} but the operator has {inputs} inputs")]
    ExpressionInput { index: usize, inputs: usize },

    /// The expression string does not parse.
    #[error("invalid expression: {0}")]
    Expression(#[from] ExpressionError),
}

/// Errors from installing weights or biases on a layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// The layer carries no parameters.
    #[error("layer {layer} has no parameters")]
    Unsupported { layer: &'static str },

    /// A different number of tensors than the layer holds.
    #[error("expected {expected} tensors, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// A flat value list whose length differs from the total parameter size.
    #[error("expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The value list cannot be split evenly across the tensors.
    #[error("{len} values cannot be split across {count} tensors")]
    NotDivisible { len: usize, count: usize },

    /// A replacement tensor has the wrong shape.
    #[error("tensor {index}: expected shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        index: usize,
        expected: [usize; 3],
        actual: [usize; 3],
    },
}

/// Lexing and parsing failures of the expression mini-language.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("'@' at position {pos} must be followed by an operand index")]
    MissingIndex { pos: usize },

    #[error("operand index at position {pos} is too large")]
    IndexOverflow { pos: usize },

    #[error("expected {expected} at token {index}")]
    Syntax { index: usize, expected: &'static str },

    #[error("unexpected trailing tokens starting at token {index}")]
    Trailing { index: usize },
}

/// Errors from the layer registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("layer type '{op_type}' is already registered")]
    Duplicate { op_type: String },

    #[error("cannot find the layer type '{op_type}'")]
    UnknownType { op_type: String },

    #[error("failed to create layer '{op_type}' for '{operator}': {source}")]
    Factory {
        op_type: String,
        operator: String,
        #[source]
        source: ParseError,
    },
}
