//! Bridge between sampled point arrays and `tch` tensors.
//!
//! Domains hand out `ndarray` point batches; models and the [`operators`]
//! work on [`tch::Tensor`]. [`variable`] turns a batch into a leaf that
//! records gradients, and [`grad_of_sum`] is the single reverse-mode call all
//! operators are built on.
//!
//! [`operators`]: crate::operators

use log::trace;
use ndarray::{Array2, ArrayView2};
use tch::{Device, Kind, Tensor};

use crate::Result;

/// Points as an untracked `(N, d)` float tensor on the CPU.
pub fn constant(points: ArrayView2<'_, f32>) -> Result<Tensor> {
    let (n, d) = points.dim();
    let data: Vec<f32> = points.iter().copied().collect();
    Ok(Tensor::f_from_slice(&data)?.f_reshape([n as i64, d as i64])?)
}

/// Points as a `(N, d)` leaf tensor that records gradients.
///
/// ```
/// use ndarray::array;
/// use pinn::autograd::{grad_of_sum, variable};
///
/// let x = variable(array![[1.0f32, 2.0]].view()).unwrap();
/// let f = &x * &x;
/// let g = grad_of_sum(&f, &[&x]).unwrap().remove(0);
/// assert_eq!(g.double_value(&[0, 1]), 4.0);
/// ```
pub fn variable(points: ArrayView2<'_, f32>) -> Result<Tensor> {
    Ok(constant(points)?.set_requires_grad(true))
}

/// Copies a 2-D tensor back into a point array.
pub fn to_points(tensor: &Tensor) -> Result<Array2<f32>> {
    let (n, d) = tensor.size2()?;
    let flat = tensor
        .f_detach()?
        .f_to_device(Device::Cpu)?
        .f_to_kind(Kind::Float)?
        .f_contiguous()?
        .f_reshape([-1])?;
    let data = Vec::<f32>::try_from(&flat)?;
    Ok(Array2::from_shape_vec((n as usize, d as usize), data)?)
}

/// Gradients of `sum(output)` with respect to each of `inputs`.
///
/// The graph is kept and the gradients are themselves differentiable, so a
/// result that still depends on a tracked input can be differentiated again.
/// A result that does not comes back with `requires_grad() == false`. Inputs
/// `output` does not reach (and untracked inputs) receive zeros shaped like
/// the input.
pub fn grad_of_sum(output: &Tensor, inputs: &[&Tensor]) -> Result<Vec<Tensor>> {
    let tracked: Vec<&Tensor> = inputs.iter().copied().filter(|t| t.requires_grad()).collect();
    if !output.requires_grad() || tracked.is_empty() {
        trace!("grad_of_sum: output is constant in all {} input(s)", inputs.len());
        return Ok(inputs.iter().map(|t| t.zeros_like()).collect());
    }

    let mut grads = Tensor::f_run_backward(&[output], &tracked, true, true)?.into_iter();
    Ok(inputs
        .iter()
        .map(|input| {
            if !input.requires_grad() {
                return input.zeros_like();
            }
            match grads.next() {
                Some(g) if g.defined() => g,
                _ => input.zeros_like(),
            }
        })
        .collect())
}
