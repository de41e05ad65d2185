// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Persisting IR graphs as manifest + SafeTensors pairs.

use crate::graph::GraphState;
use crate::manifest::{ManifestOperand, ManifestOperator};
use crate::{IrGraph, ModelError, ModelManifest};
use std::path::Path;
use tensor_core::DataType;

/// Writes graphs in the format read by [`crate::ModelLoader`].
///
/// Attribute `attr` of operator `op` is stored under the SafeTensors key
/// `"{op}.{attr}"`.
pub struct ModelWriter;

impl ModelWriter {
    /// Builds the manifest describing `graph`.
    pub fn manifest<S: GraphState>(graph: &IrGraph<S>) -> ModelManifest {
        ModelManifest {
            name: graph.name.clone(),
            operands: graph
                .operands
                .iter()
                .map(|o| ManifestOperand {
                    name: o.name.clone(),
                    producer: o.producer.clone(),
                    consumers: o.consumers.clone(),
                    shape: o.shape.clone(),
                    dtype: o.dtype,
                })
                .collect(),
            operators: graph
                .operators
                .iter()
                .map(|op| ManifestOperator {
                    name: op.name.clone(),
                    op_type: op.op_type.clone(),
                    inputs: op.inputs.clone(),
                    outputs: op.outputs.clone(),
                    params: op.params.clone(),
                    attrs: op
                        .attributes
                        .keys()
                        .map(|attr| (attr.clone(), weight_key(&op.name, attr)))
                        .collect(),
                })
                .collect(),
        }
    }

    /// Writes the manifest to `param_path` and all attributes to `weight_path`.
    pub fn save<S: GraphState>(
        graph: &IrGraph<S>,
        param_path: &Path,
        weight_path: &Path,
    ) -> Result<(), ModelError> {
        let mut views = Vec::new();
        for op in &graph.operators {
            for (attr_name, attr) in &op.attributes {
                let dtype = convert_dtype(attr.dtype)?;
                let view = safetensors::tensor::TensorView::new(dtype, attr.shape.clone(), &attr.data)
                    .map_err(|e| {
                        ModelError::SafeTensorsError(format!(
                            "attribute '{attr_name}' of '{}': {e}",
                            op.name
                        ))
                    })?;
                views.push((weight_key(&op.name, attr_name), view));
            }
        }
        let bytes = safetensors::tensor::serialize(views, &None)
            .map_err(|e| ModelError::SafeTensorsError(format!("serialize failed: {e}")))?;
        std::fs::write(weight_path, bytes)?;

        std::fs::write(param_path, Self::manifest(graph).to_json()?)?;
        tracing::debug!(
            param = %param_path.display(),
            weights = %weight_path.display(),
            "model written"
        );
        Ok(())
    }
}

fn weight_key(operator: &str, attribute: &str) -> String {
    format!("{operator}.{attribute}")
}

fn convert_dtype(dtype: DataType) -> Result<safetensors::Dtype, ModelError> {
    match dtype {
        DataType::Float32 => Ok(safetensors::Dtype::F32),
        DataType::Float64 => Ok(safetensors::Dtype::F64),
        DataType::Float16 => Ok(safetensors::Dtype::F16),
        DataType::Int8 => Ok(safetensors::Dtype::I8),
        DataType::Unknown => Err(ModelError::Attribute {
            detail: "cannot store an attribute of unknown type".into(),
        }),
    }
}
