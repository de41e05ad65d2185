// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The layer abstraction shared by every kernel.
//!
//! A [`Layer`] maps a batch of input tensors to a batch of output tensors.
//! Layers that carry learned parameters expose them through a
//! [`ParamStore`]; the trait's default parameter methods delegate to it and
//! report [`ParamError::Unsupported`] for parameter-free layers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use model_ir::{Attribute, Parameter};
use tensor_core::Tensor;

use crate::{InferError, ParamError};

/// A tensor handle shared between operand slots.
pub type SharedTensor = Arc<Tensor>;

// ── Layer ──────────────────────────────────────────────────────────

/// A computation node of the runtime graph.
pub trait Layer: Send + fmt::Debug {
    /// Kernel name used in logs and errors, e.g. `"Convolution"`.
    fn name(&self) -> &'static str;

    /// Runs the layer on a batch.
    ///
    /// `outputs` holds one slot per batch item. A kernel allocates empty
    /// slots and validates the shape of pre-allocated ones.
    fn forward(
        &mut self,
        inputs: &[SharedTensor],
        outputs: &mut [Option<SharedTensor>],
    ) -> Result<(), InferError>;

    /// Parameter storage, if the layer has any.
    fn params(&self) -> Option<&ParamStore> {
        None
    }

    fn params_mut(&mut self) -> Option<&mut ParamStore> {
        None
    }

    fn has_params(&self) -> bool {
        self.params().is_some()
    }

    fn weights(&self) -> &[Tensor] {
        self.params().map(ParamStore::weights).unwrap_or(&[])
    }

    fn bias(&self) -> &[Tensor] {
        self.params().map(ParamStore::bias).unwrap_or(&[])
    }

    /// Fills the weight tensors from a flat list of row-major values.
    fn set_weights(&mut self, values: &[f32]) -> Result<(), ParamError> {
        let layer = self.name();
        match self.params_mut() {
            Some(store) => store.set_weights(values),
            None => Err(ParamError::Unsupported { layer }),
        }
    }

    /// Replaces the weight tensors; count and shapes must match.
    fn set_weight_tensors(&mut self, weights: Vec<Tensor>) -> Result<(), ParamError> {
        let layer = self.name();
        match self.params_mut() {
            Some(store) => store.set_weight_tensors(weights),
            None => Err(ParamError::Unsupported { layer }),
        }
    }

    fn set_bias(&mut self, values: &[f32]) -> Result<(), ParamError> {
        let layer = self.name();
        match self.params_mut() {
            Some(store) => store.set_bias(values),
            None => Err(ParamError::Unsupported { layer }),
        }
    }

    fn set_bias_tensors(&mut self, bias: Vec<Tensor>) -> Result<(), ParamError> {
        let layer = self.name();
        match self.params_mut() {
            Some(store) => store.set_bias_tensors(bias),
            None => Err(ParamError::Unsupported { layer }),
        }
    }
}

// ── ParamStore ─────────────────────────────────────────────────────

/// Weight and bias tensors of a parameterised layer.
#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    weights: Vec<Tensor>,
    bias: Vec<Tensor>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `count` zero weight tensors of shape `(channels, rows, cols)`.
    pub fn init_weight_param(&mut self, count: usize, channels: usize, rows: usize, cols: usize) {
        self.weights = (0..count)
            .map(|_| Tensor::new(channels, rows, cols))
            .collect();
    }

    /// Allocates `count` zero bias tensors of shape `(channels, rows, cols)`.
    pub fn init_bias_param(&mut self, count: usize, channels: usize, rows: usize, cols: usize) {
        self.bias = (0..count)
            .map(|_| Tensor::new(channels, rows, cols))
            .collect();
    }

    pub fn weights(&self) -> &[Tensor] {
        &self.weights
    }

    pub fn bias(&self) -> &[Tensor] {
        &self.bias
    }

    pub fn set_weights(&mut self, values: &[f32]) -> Result<(), ParamError> {
        fill_split(&mut self.weights, values)
    }

    pub fn set_bias(&mut self, values: &[f32]) -> Result<(), ParamError> {
        fill_split(&mut self.bias, values)
    }

    pub fn set_weight_tensors(&mut self, weights: Vec<Tensor>) -> Result<(), ParamError> {
        replace_checked(&mut self.weights, weights)
    }

    pub fn set_bias_tensors(&mut self, bias: Vec<Tensor>) -> Result<(), ParamError> {
        replace_checked(&mut self.bias, bias)
    }
}

/// Splits `values` evenly across `tensors`, filling each row-major.
fn fill_split(tensors: &mut [Tensor], values: &[f32]) -> Result<(), ParamError> {
    let total: usize = tensors.iter().map(Tensor::size).sum();
    if total != values.len() {
        return Err(ParamError::SizeMismatch {
            expected: total,
            actual: values.len(),
        });
    }
    let count = tensors.len();
    if count == 0 {
        return Ok(());
    }
    if values.len() % count != 0 {
        return Err(ParamError::NotDivisible {
            len: values.len(),
            count,
        });
    }
    let blob = values.len() / count;
    for (i, tensor) in tensors.iter_mut().enumerate() {
        if tensor.size() != blob {
            return Err(ParamError::SizeMismatch {
                expected: tensor.size(),
                actual: blob,
            });
        }
        tensor
            .fill_values(&values[i * blob..(i + 1) * blob], true)
            .map_err(|_| ParamError::SizeMismatch {
                expected: tensor.size(),
                actual: blob,
            })?;
    }
    Ok(())
}

fn replace_checked(current: &mut Vec<Tensor>, next: Vec<Tensor>) -> Result<(), ParamError> {
    if current.len() != next.len() {
        return Err(ParamError::CountMismatch {
            expected: current.len(),
            actual: next.len(),
        });
    }
    for (index, (old, new)) in current.iter().zip(&next).enumerate() {
        if old.dims() != new.dims() {
            return Err(ParamError::ShapeMismatch {
                index,
                expected: old.dims(),
                actual: new.dims(),
            });
        }
    }
    *current = next;
    Ok(())
}

// ── Node binding ───────────────────────────────────────────────────

/// Index of the runtime node a layer executes for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A layer together with the handle of the node that owns it.
#[derive(Debug)]
pub struct BoundLayer {
    pub node: NodeHandle,
    pub layer: Box<dyn Layer>,
}

impl BoundLayer {
    pub fn new(node: NodeHandle, layer: Box<dyn Layer>) -> Self {
        Self { node, layer }
    }
}

// ── Operator view ──────────────────────────────────────────────────

/// What a layer factory sees of a graph node: its identity, parameters,
/// and attributes (mutable, so weights can be consumed).
#[derive(Debug)]
pub struct OperatorView<'a> {
    pub name: &'a str,
    pub op_type: &'a str,
    pub params: &'a BTreeMap<String, Parameter>,
    pub attributes: &'a mut BTreeMap<String, Attribute>,
    /// Number of input operands, when the caller knows it.
    pub num_inputs: Option<usize>,
}

impl<'a> OperatorView<'a> {
    pub fn new(
        name: &'a str,
        op_type: &'a str,
        params: &'a BTreeMap<String, Parameter>,
        attributes: &'a mut BTreeMap<String, Attribute>,
    ) -> Self {
        Self {
            name,
            op_type,
            params,
            attributes,
            num_inputs: None,
        }
    }

    pub fn with_inputs(mut self, count: usize) -> Self {
        self.num_inputs = Some(count);
        self
    }

    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.get_mut(name)
    }
}

// ── Kernel helpers ─────────────────────────────────────────────────

/// Checks the batch preconditions shared by one-to-one kernels.
pub(crate) fn check_batch(
    layer: &'static str,
    inputs: &[SharedTensor],
    outputs: &[Option<SharedTensor>],
) -> Result<(), InferError> {
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
    if inputs.iter().any(|t| t.is_empty()) {
        return Err(InferError::InputEmpty { layer });
    }
    Ok(())
}

/// Returns a writable tensor for `slot`, allocating `dims` if the slot is
/// empty and rejecting a pre-allocated tensor of a different shape.
pub(crate) fn output_slot<'a>(
    layer: &'static str,
    slot: &'a mut Option<SharedTensor>,
    dims: [usize; 3],
) -> Result<&'a mut Tensor, InferError> {
    match slot {
        Some(existing) if existing.dims() != dims => {
            return Err(InferError::OutputSize {
                layer,
                detail: format!(
                    "output tensor is {:?}, expected {:?}",
                    existing.dims(),
                    dims
                ),
            })
        }
        Some(_) => {}
        None => {
            let [c, r, w] = dims;
            *slot = Some(Arc::new(Tensor::new(c, r, w)));
        }
    }
    match slot {
        Some(tensor) => Ok(Arc::make_mut(tensor)),
        None => Err(InferError::OutputEmpty { layer }),
    }
}

/// Reads a two-element integer array parameter as non-negative extents.
pub(crate) fn pair_param(params: &OperatorView<'_>, name: &str) -> Option<(usize, usize)> {
    match params.param(name)?.as_int_array()? {
        [a, b] => Some((usize::try_from(*a).ok()?, usize::try_from(*b).ok()?)),
        _ => None,
    }
}

/// Reads a non-negative integer parameter.
pub(crate) fn usize_param(params: &OperatorView<'_>, name: &str) -> Option<usize> {
    usize::try_from(params.param(name)?.as_int()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Identity;

    impl Layer for Identity {
        fn name(&self) -> &'static str {
            "Identity"
        }

        fn forward(
            &mut self,
            inputs: &[SharedTensor],
            outputs: &mut [Option<SharedTensor>],
        ) -> Result<(), InferError> {
            check_batch(self.name(), inputs, outputs)?;
            for (input, slot) in inputs.iter().zip(outputs.iter_mut()) {
                *slot = Some(Arc::clone(input));
            }
            Ok(())
        }
    }

    #[test]
    fn test_parameter_free_layer_rejects_weights() {
        let mut layer = Identity;
        assert!(!layer.has_params());
        assert!(layer.weights().is_empty());
        assert_eq!(
            layer.set_weights(&[1.0]),
            Err(ParamError::Unsupported { layer: "Identity" })
        );
        assert!(layer.set_bias_tensors(vec![]).is_err());
    }

    #[test]
    fn test_param_store_split_fill() {
        let mut store = ParamStore::new();
        store.init_weight_param(2, 1, 2, 2);
        store
            .set_weights(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .unwrap();
        assert_eq!(store.weights()[0].values(true), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(store.weights()[1].at(0, 1, 0), 7.0);
    }

    #[test]
    fn test_param_store_size_checks() {
        let mut store = ParamStore::new();
        store.init_bias_param(3, 1, 1, 1);
        assert_eq!(
            store.set_bias(&[1.0, 2.0]),
            Err(ParamError::SizeMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(store.set_bias(&[1.0, 2.0, 3.0]).is_ok());
        assert_eq!(store.bias()[2].index(0).unwrap(), 3.0);
    }

    #[test]
    fn test_param_store_tensor_replacement() {
        let mut store = ParamStore::new();
        store.init_weight_param(1, 2, 3, 3);
        assert!(matches!(
            store.set_weight_tensors(vec![Tensor::new(2, 3, 3), Tensor::new(2, 3, 3)]),
            Err(ParamError::CountMismatch { .. })
        ));
        assert!(matches!(
            store.set_weight_tensors(vec![Tensor::new(1, 3, 3)]),
            Err(ParamError::ShapeMismatch { index: 0, .. })
        ));
        let mut replacement = Tensor::new(2, 3, 3);
        replacement.ones();
        store.set_weight_tensors(vec![replacement]).unwrap();
        assert_eq!(store.weights()[0].data().iter().sum::<f32>(), 18.0);
    }

    #[test]
    fn test_output_slot_allocates_and_validates() {
        let mut slot = None;
        output_slot("Test", &mut slot, [1, 2, 2]).unwrap().fill(4.0);
        assert_eq!(slot.as_ref().unwrap().data(), &[4.0; 4]);

        let mut wrong = Some(Arc::new(Tensor::new(1, 3, 3)));
        assert!(matches!(
            output_slot("Test", &mut wrong, [1, 2, 2]),
            Err(InferError::OutputSize { .. })
        ));
    }

    #[test]
    fn test_output_slot_copies_on_write() {
        let shared = Arc::new(Tensor::new(1, 1, 2));
        let mut slot = Some(Arc::clone(&shared));
        output_slot("Test", &mut slot, [1, 1, 2]).unwrap().fill(1.0);
        assert_eq!(shared.data(), &[0.0, 0.0]);
        assert_eq!(slot.unwrap().data(), &[1.0, 1.0]);
    }

    #[test]
    fn test_check_batch() {
        let input = Arc::new(Tensor::new(1, 1, 1));
        let mut layer = Identity;
        let mut outputs = vec![None];
        layer.forward(&[Arc::clone(&input)], &mut outputs).unwrap();
        assert!(Arc::ptr_eq(outputs[0].as_ref().unwrap(), &input));

        assert!(matches!(
            layer.forward(&[], &mut []),
            Err(InferError::InputEmpty { .. })
        ));
        assert!(matches!(
            layer.forward(&[input], &mut [None, None]),
            Err(InferError::InputOutputSizeMismatch { .. })
        ));
    }
}
