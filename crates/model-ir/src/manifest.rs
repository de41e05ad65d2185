// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON model manifest parsing.
//!
//! The manifest (`model.json`) lists operands and operators and maps each
//! operator attribute to a tensor name in the SafeTensors file.
//!
//! # Format
//! ```json
//! {
//!   "name": "tiny-cnn",
//!   "operands": [
//!     { "name": "0", "producer": "pnnx_input_0", "consumers": ["conv1"],
//!       "shape": [1, 3, 8, 8], "dtype": 1 }
//!   ],
//!   "operators": [
//!     { "name": "conv1", "type": "nn.Conv2d", "inputs": ["0"], "outputs": ["1"],
//!       "params": { "bias": { "bool": true } },
//!       "attrs": { "weight": "conv1.weight", "bias": "conv1.bias" } }
//!   ]
//! }
//! ```

use crate::{ModelError, Parameter};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level model manifest, deserialized from `model.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    /// Human-readable model name.
    pub name: String,
    #[serde(default)]
    pub operands: Vec<ManifestOperand>,
    pub operators: Vec<ManifestOperator>,
}

/// A single operand entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestOperand {
    pub name: String,
    pub producer: String,
    #[serde(default)]
    pub consumers: Vec<String>,
    #[serde(default)]
    pub shape: Vec<usize>,
    #[serde(default = "default_dtype")]
    pub dtype: i32,
}

fn default_dtype() -> i32 {
    1
}

/// A single operator entry in the manifest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestOperator {
    pub name: String,
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Parameter>,
    /// Attribute name → SafeTensors tensor name.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl ModelManifest {
    /// Loads a manifest from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    /// Parses a manifest from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let manifest: Self = serde_json::from_str(json)?;
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates that the manifest is internally consistent.
    ///
    /// Checks:
    /// - At least one operator is defined.
    /// - No duplicate operator names.
    /// - No operator declares an empty type.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.operators.is_empty() {
            return Err(ModelError::InvalidGraph(
                "manifest contains no operators".into(),
            ));
        }

        let mut seen_names = std::collections::HashSet::new();
        for op in &self.operators {
            if !seen_names.insert(&op.name) {
                return Err(ModelError::InvalidOperator {
                    operator: op.name.clone(),
                    detail: "duplicate operator name".into(),
                });
            }
            if op.op_type.trim().is_empty() {
                return Err(ModelError::InvalidOperator {
                    operator: op.name.clone(),
                    detail: "operator type is empty".into(),
                });
            }
        }

        Ok(())
    }

    /// Returns every distinct SafeTensors name the manifest refers to.
    pub fn weight_names(&self) -> Vec<&str> {
        let mut unique: Vec<&str> = self
            .operators
            .iter()
            .flat_map(|op| op.attrs.values().map(String::as_str))
            .collect();
        unique.sort_unstable();
        unique.dedup();
        unique
    }
}
