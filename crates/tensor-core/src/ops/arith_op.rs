// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Broadcasting, elementwise arithmetic, comparison and padding.

use std::borrow::Cow;

use crate::{Tensor, TensorError};

/// Absolute tolerance used by [`is_same`].
const SAME_TOLERANCE: f32 = 1e-5;

/// Brings two tensors to a common shape.
///
/// Equal shapes are returned as borrowed. Otherwise the channel counts must
/// match and one side must be a per-channel scalar (`rows == cols == 1`);
/// that side is expanded across the other's spatial extent.
///
/// # Errors
/// Returns [`TensorError::Broadcast`] for any other combination.
pub fn broadcast<'a>(
    lhs: &'a Tensor,
    rhs: &'a Tensor,
) -> Result<(Cow<'a, Tensor>, Cow<'a, Tensor>), TensorError> {
    if lhs.dims() == rhs.dims() {
        return Ok((Cow::Borrowed(lhs), Cow::Borrowed(rhs)));
    }
    let error = || TensorError::Broadcast {
        lhs: lhs.shape(),
        rhs: rhs.shape(),
    };
    if lhs.channels() != rhs.channels() {
        return Err(error());
    }
    if is_channel_scalar(rhs) {
        let expanded = expand(rhs, lhs.rows(), lhs.cols()).ok_or_else(error)?;
        Ok((Cow::Borrowed(lhs), Cow::Owned(expanded)))
    } else if is_channel_scalar(lhs) {
        let expanded = expand(lhs, rhs.rows(), rhs.cols()).ok_or_else(error)?;
        Ok((Cow::Owned(expanded), Cow::Borrowed(rhs)))
    } else {
        Err(error())
    }
}

fn is_channel_scalar(t: &Tensor) -> bool {
    t.rows() == 1 && t.cols() == 1
}

fn expand(scalars: &Tensor, rows: usize, cols: usize) -> Option<Tensor> {
    if scalars.size() != scalars.channels() {
        return None;
    }
    let mut out = Tensor::new(scalars.channels(), rows, cols);
    for (c, &value) in scalars.data().iter().enumerate() {
        out.channel_mut(c).iter_mut().for_each(|x| *x = value);
    }
    Some(out)
}

fn zip_with<F>(
    op: &'static str,
    lhs: &Tensor,
    rhs: &Tensor,
    out: &mut Tensor,
    f: F,
) -> Result<(), TensorError>
where
    F: Fn(f32, f32) -> f32,
{
    let (a, b) = broadcast(lhs, rhs)?;
    if out.dims() != a.dims() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: a.shape(),
            rhs: out.shape(),
        });
    }
    for ((o, &x), &y) in out.data_mut().iter_mut().zip(a.data()).zip(b.data()) {
        *o = f(x, y);
    }
    Ok(())
}

fn result_dims(lhs: &Tensor, rhs: &Tensor) -> [usize; 3] {
    if is_channel_scalar(lhs) && !is_channel_scalar(rhs) {
        rhs.dims()
    } else {
        lhs.dims()
    }
}

/// Elementwise sum with broadcasting, returning a new tensor.
///
/// # Examples
/// ```
/// use tensor_core::{add, Tensor};
/// let a = Tensor::from_values(1, 1, 2, &[1.0, 2.0], true).unwrap();
/// let b = Tensor::from_values(1, 1, 2, &[3.0, 4.0], true).unwrap();
/// assert_eq!(add(&a, &b).unwrap().values(true), vec![4.0, 6.0]);
/// ```
pub fn add(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, TensorError> {
    let [c, r, w] = result_dims(lhs, rhs);
    let mut out = Tensor::new(c, r, w);
    add_into(lhs, rhs, &mut out)?;
    Ok(out)
}

/// Elementwise sum with broadcasting into `out`, whose shape must equal the
/// broadcast shape.
pub fn add_into(lhs: &Tensor, rhs: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    zip_with("add", lhs, rhs, out, |x, y| x + y)
}

/// Elementwise (Hadamard) product with broadcasting, returning a new tensor.
pub fn multiply(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor, TensorError> {
    let [c, r, w] = result_dims(lhs, rhs);
    let mut out = Tensor::new(c, r, w);
    multiply_into(lhs, rhs, &mut out)?;
    Ok(out)
}

/// Elementwise product with broadcasting into `out`.
pub fn multiply_into(lhs: &Tensor, rhs: &Tensor, out: &mut Tensor) -> Result<(), TensorError> {
    zip_with("multiply", lhs, rhs, out, |x, y| x * y)
}

/// Returns `true` when both tensors have the same physical shape and every
/// pair of elements differs by at most `1e-5`.
pub fn is_same(lhs: &Tensor, rhs: &Tensor) -> bool {
    lhs.dims() == rhs.dims()
        && lhs
            .data()
            .iter()
            .zip(rhs.data())
            .all(|(a, b)| (a - b).abs() <= SAME_TOLERANCE)
}

/// Returns a padded copy of `tensor` (see [`Tensor::padding`]).
pub fn padded(tensor: &Tensor, pads: [usize; 4], value: f32) -> Tensor {
    let mut out = tensor.clone();
    out.padding(pads, value);
    out
}
