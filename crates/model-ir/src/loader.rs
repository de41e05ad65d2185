// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading from a JSON manifest + SafeTensors weight file.
//!
//! A model is described by two files:
//! - the *param* file, a JSON manifest (see [`ModelManifest`]) listing
//!   operands, operators and their configuration;
//! - the *weight* file, a SafeTensors container holding every attribute
//!   payload referenced by the manifest.
//!
//! The weight file is memory-mapped and only the referenced tensors are
//! copied out into [`Attribute`]s.

use crate::graph::Validated;
use crate::{Attribute, IrGraph, IrOperand, IrOperator, ModelError, ModelManifest};
use std::collections::HashMap;
use std::path::Path;
use tensor_core::DataType;

/// Source of validated IR graphs.
///
/// The runtime graph calls [`load_graph`](IrLoader::load_graph) once per
/// initialisation. Implement it to plug in other export formats.
pub trait IrLoader: Send + Sync {
    fn load_graph(
        &self,
        param_path: &Path,
        weight_path: &Path,
    ) -> Result<IrGraph<Validated>, ModelError>;
}

/// Loads a model from disk into a validated [`IrGraph`].
///
/// # Example
/// ```no_run
/// use model_ir::ModelLoader;
/// use std::path::Path;
///
/// let graph = ModelLoader::load(
///     Path::new("./models/demo/model.json"),
///     Path::new("./models/demo/model.safetensors"),
/// )
/// .unwrap();
/// println!("Loaded {} operators", graph.num_operators());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelLoader;

impl ModelLoader {
    /// Loads and validates a model.
    ///
    /// Steps:
    /// 1. Parse the manifest and validate it.
    /// 2. Read every referenced tensor from the SafeTensors file.
    /// 3. Combine both into operand and operator records.
    /// 4. Validate the resulting graph.
    pub fn load(param_path: &Path, weight_path: &Path) -> Result<IrGraph<Validated>, ModelError> {
        let manifest = ModelManifest::from_file(param_path)?;
        manifest.validate()?;

        let weights = Self::read_weights(weight_path, &manifest.weight_names())?;
        tracing::debug!(
            operators = manifest.operators.len(),
            weights = weights.len(),
            "manifest parsed"
        );

        Self::from_manifest_and_weights(&manifest, &weights)
    }

    /// Builds a graph from a manifest and a pre-loaded weight map.
    ///
    /// Useful for testing without actual SafeTensors files.
    pub fn from_manifest_and_weights(
        manifest: &ModelManifest,
        weights: &HashMap<String, Attribute>,
    ) -> Result<IrGraph<Validated>, ModelError> {
        manifest.validate()?;

        let operands = manifest
            .operands
            .iter()
            .map(|o| IrOperand {
                name: o.name.clone(),
                producer: o.producer.clone(),
                consumers: o.consumers.clone(),
                shape: o.shape.clone(),
                dtype: o.dtype,
            })
            .collect();

        let mut operators = Vec::with_capacity(manifest.operators.len());
        for mo in &manifest.operators {
            let mut op = IrOperator::new(mo.name.clone(), mo.op_type.clone());
            op.inputs = mo.inputs.clone();
            op.outputs = mo.outputs.clone();
            op.params = mo.params.clone();
            for (attr_name, tensor_name) in &mo.attrs {
                let attr = weights
                    .get(tensor_name)
                    .ok_or_else(|| ModelError::WeightNotFound {
                        name: tensor_name.clone(),
                    })?;
                op.attributes.insert(attr_name.clone(), attr.clone());
            }
            operators.push(op);
        }

        IrGraph::new(manifest.name.clone(), operands, operators).validate()
    }

    /// Copies the named tensors out of a memory-mapped SafeTensors file.
    fn read_weights(
        weight_path: &Path,
        names: &[&str],
    ) -> Result<HashMap<String, Attribute>, ModelError> {
        let file = std::fs::File::open(weight_path).map_err(|e| {
            ModelError::SafeTensorsError(format!(
                "cannot open '{}': {e}",
                weight_path.display()
            ))
        })?;

        // SAFETY: the mapping is read-only and dropped before returning.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| ModelError::SafeTensorsError(format!("mmap failed: {e}")))?;

        let tensors = safetensors::SafeTensors::deserialize(&mmap).map_err(|e| {
            ModelError::SafeTensorsError(format!("SafeTensors parse error: {e}"))
        })?;

        let mut out = HashMap::with_capacity(names.len());
        for &name in names {
            let view = tensors
                .tensor(name)
                .map_err(|_| ModelError::WeightNotFound {
                    name: name.to_string(),
                })?;
            let dtype = convert_safetensor_dtype(view.dtype())?;
            out.insert(
                name.to_string(),
                Attribute::new(dtype, view.shape().to_vec(), view.data().to_vec()),
            );
        }

        Ok(out)
    }
}

impl IrLoader for ModelLoader {
    fn load_graph(
        &self,
        param_path: &Path,
        weight_path: &Path,
    ) -> Result<IrGraph<Validated>, ModelError> {
        ModelLoader::load(param_path, weight_path)
    }
}

/// Converts a SafeTensors `Dtype` to our [`DataType`].
fn convert_safetensor_dtype(st_dtype: safetensors::Dtype) -> Result<DataType, ModelError> {
    match st_dtype {
        safetensors::Dtype::F32 => Ok(DataType::Float32),
        safetensors::Dtype::F64 => Ok(DataType::Float64),
        safetensors::Dtype::F16 => Ok(DataType::Float16),
        safetensors::Dtype::I8 => Ok(DataType::Int8),
        other => Err(ModelError::SafeTensorsError(format!(
            "unsupported SafeTensors dtype: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ModelManifest {
        ModelManifest::from_json(
            r#"{
                "name": "fc",
                "operands": [
                    { "name": "0", "producer": "in", "consumers": ["fc"], "shape": [1, 3] },
                    { "name": "1", "producer": "fc", "consumers": ["out"], "shape": [1, 2] }
                ],
                "operators": [
                    { "name": "in", "type": "pnnx.Input", "outputs": ["0"] },
                    { "name": "fc", "type": "nn.Linear", "inputs": ["0"], "outputs": ["1"],
                      "params": { "bias": { "bool": false } },
                      "attrs": { "weight": "fc.weight" } },
                    { "name": "out", "type": "pnnx.Output", "inputs": ["1"] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_from_manifest_and_weights() {
        let mut weights = HashMap::new();
        weights.insert(
            "fc.weight".to_string(),
            Attribute::from_f32(vec![2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        );
        let graph = ModelLoader::from_manifest_and_weights(&manifest(), &weights).unwrap();
        let fc = graph.operator("fc").unwrap();
        assert_eq!(fc.attributes["weight"].shape, vec![2, 3]);
        assert_eq!(graph.operand("0").unwrap().consumers, vec!["fc".to_string()]);
    }

    #[test]
    fn test_missing_weight() {
        let err = ModelLoader::from_manifest_and_weights(&manifest(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ModelError::WeightNotFound { name } if name == "fc.weight"));
    }

    #[test]
    fn test_missing_files() {
        let missing = Path::new("/nonexistent/model.json");
        assert!(matches!(
            ModelLoader.load_graph(missing, missing),
            Err(ModelError::ManifestReadError(_))
        ));
    }

    #[test]
    fn test_convert_dtype() {
        assert_eq!(
            convert_safetensor_dtype(safetensors::Dtype::F32).unwrap(),
            DataType::Float32
        );
        assert!(convert_safetensor_dtype(safetensors::Dtype::U8).is_err());
    }
}
