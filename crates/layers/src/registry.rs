// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator type → layer factory table.

use std::collections::BTreeMap;
use std::fmt;

use crate::kernels::{
    AdaptiveAveragePooling, Convolution, Expression, Flatten, Linear, MaxPooling, Relu, Softmax,
};
use crate::{Layer, OperatorView, ParseError, RegistryError};

/// Builds a layer from an operator's parameters and attributes.
pub type LayerFactory = fn(&mut OperatorView<'_>) -> Result<Box<dyn Layer>, ParseError>;

/// Maps operator type strings such as `"nn.Conv2d"` to layer factories.
#[derive(Clone, Default)]
pub struct LayerRegistry {
    creators: BTreeMap<String, LayerFactory>,
}

impl fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl LayerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `op_type`.
    ///
    /// # Errors
    /// Returns [`RegistryError::Duplicate`] if the type is already taken.
    pub fn register(
        &mut self,
        op_type: impl Into<String>,
        factory: LayerFactory,
    ) -> Result<(), RegistryError> {
        let op_type = op_type.into();
        if self.creators.contains_key(&op_type) {
            return Err(RegistryError::Duplicate { op_type });
        }
        tracing::trace!("registered layer type '{op_type}'");
        self.creators.insert(op_type, factory);
        Ok(())
    }

    /// Instantiates the layer for `op` through the factory of its type.
    pub fn create_layer(
        &self,
        op: &mut OperatorView<'_>,
    ) -> Result<Box<dyn Layer>, RegistryError> {
        let factory = self
            .creators
            .get(op.op_type)
            .ok_or_else(|| RegistryError::UnknownType {
                op_type: op.op_type.to_string(),
            })?;
        let layer = factory(op).map_err(|source| RegistryError::Factory {
            op_type: op.op_type.to_string(),
            operator: op.name.to_string(),
            source,
        })?;
        tracing::debug!("created {} layer for '{}'", layer.name(), op.name);
        Ok(layer)
    }

    pub fn contains(&self, op_type: &str) -> bool {
        self.creators.contains_key(op_type)
    }

    /// Registered type strings in sorted order.
    pub fn registered_types(&self) -> Vec<&str> {
        self.creators.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

const BUILTINS: &[(&str, LayerFactory)] = &[
    ("nn.Conv2d", Convolution::from_operator),
    ("nn.MaxPool2d", MaxPooling::from_operator),
    ("nn.AdaptiveAvgPool2d", AdaptiveAveragePooling::from_operator),
    ("nn.Softmax", Softmax::from_operator),
    ("F.softmax", Softmax::from_operator),
    ("nn.Linear", Linear::from_operator),
    ("torch.flatten", Flatten::from_operator),
    ("nn.ReLU", Relu::from_operator),
    ("pnnx.Expression", Expression::from_operator),
];

/// A registry holding every built-in kernel.
pub fn register_all() -> LayerRegistry {
    let mut registry = LayerRegistry::new();
    for &(op_type, factory) in BUILTINS {
        registry.creators.insert(op_type.to_string(), factory);
    }
    tracing::debug!("layer registry holds {} types", registry.len());
    registry
}
