// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction and execution.

use crate::GraphState;

/// Errors raised while building or running a [`RuntimeGraph`](crate::RuntimeGraph).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Model loading failed.
    #[error("model error: {0}")]
    ModelError(#[from] model_ir::ModelError),

    /// A layer could not be created for an operator.
    #[error("layer registry error: {0}")]
    Registry(#[from] layers::RegistryError),

    /// A layer's forward pass failed.
    #[error("inference failed at node '{node}': {source}")]
    Infer {
        node: String,
        #[source]
        source: layers::InferError,
    },

    /// The graph could not be initialised from its model files.
    #[error("graph initialisation failed: {0}")]
    InitFailed(String),

    /// An operation was attempted in the wrong lifecycle state.
    #[error("graph is in state {actual}, expected {expected}")]
    InvalidState {
        expected: GraphState,
        actual: GraphState,
    },

    /// An operand or attribute declares a dtype other than `f32`.
    #[error("unsupported data type tag {tag} for '{name}'")]
    UnsupportedDataType { name: String, tag: i32 },

    /// A declared operand shape cannot be mapped onto a 3-D tensor.
    #[error("operand '{operand}' has unsupported shape {shape:?}")]
    InvalidShape { operand: String, shape: Vec<usize> },

    /// The caller's batch does not match the slots of an operand.
    #[error("batch size mismatch at '{node}': expected {expected}, got {actual}")]
    BatchMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },

    /// A node named as graph input or output does not exist.
    #[error("graph has no node named '{0}'")]
    MissingNode(String),

    /// A layer's node handle does not resolve to a node.
    #[error("layer handle {handle} does not resolve ({nodes} nodes)")]
    InvalidHandle { handle: usize, nodes: usize },

    /// The scheduled order is not a permutation of the nodes.
    #[error("topology error: {0}")]
    Topology(String),

    /// A node was not executed during a forward pass.
    #[error("node '{0}' was not visited during the forward pass")]
    NodeNotVisited(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
