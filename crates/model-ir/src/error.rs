// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for model loading and IR construction.

/// Errors that can occur when working with model representations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The model manifest file could not be read or written.
    #[error("failed to read manifest: {0}")]
    ManifestReadError(#[from] std::io::Error),

    /// The manifest JSON is malformed.
    #[error("failed to parse manifest: {0}")]
    ManifestParseError(#[from] serde_json::Error),

    /// A weight tensor referenced in the manifest was not found in the SafeTensors file.
    #[error("weight tensor not found: {name}")]
    WeightNotFound { name: String },

    /// The SafeTensors file could not be loaded or written.
    #[error("failed to load SafeTensors: {0}")]
    SafeTensorsError(String),

    /// An operator record is invalid (e.g. references an unknown operand).
    #[error("invalid operator '{operator}': {detail}")]
    InvalidOperator { operator: String, detail: String },

    /// The operator graph is empty or its edges are inconsistent.
    #[error("invalid model graph: {0}")]
    InvalidGraph(String),

    /// An attribute's payload cannot be decoded as requested.
    #[error("invalid attribute: {detail}")]
    Attribute { detail: String },
}
