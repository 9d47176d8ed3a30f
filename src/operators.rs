//! Differential operators on model outputs.
//!
//! Every operator takes an output [`Tensor`] computed from one or more tracked
//! inputs (each of shape `(N, d_i)`) and returns a derivative tensor whose
//! first axis is the batch axis `N`. Results stay attached to the graph, so
//! they can be combined into a loss and differentiated again.
//!
//! | Operator | Output shape |
//! |----------|--------------|
//! | [`grad`] | `(N, Σ d_i)` |
//! | [`laplacian`] | `(N, 1)` |
//! | [`div`] | `(N, 1)` |
//! | [`jac`] | `(N, M, Σ d_i)` |
//! | [`rot`] | `(N, 3)` |
//! | [`partial`] | shape of the last variable |
//! | [`normal_derivative`] | `(N, 1)` |
//! | [`convective`] | `(N, M)` |
//!
//! When a first derivative no longer depends on any tracked input (the output
//! is linear in that variable), second-order operators contribute zeros for it
//! instead of differentiating further.

use log::debug;
use tch::Tensor;

use crate::autograd::grad_of_sum;
use crate::{Error, Result};

/// d(sum(output))/d(input) for a single input.
fn derivative(output: &Tensor, input: &Tensor) -> Result<Tensor> {
    let mut grads = grad_of_sum(output, &[input])?;
    Ok(grads.remove(0))
}

fn shape(t: &Tensor) -> Vec<usize> {
    t.size().into_iter().map(|s| s as usize).collect()
}

fn batch_size(t: &Tensor) -> Result<i64> {
    let size = t.size();
    if size.len() != 2 {
        return Err(Error::ShapeMismatch {
            expected: vec![size.first().map_or(0, |&n| n as usize), 1],
            found: shape(t),
        });
    }
    Ok(size[0])
}

/// Checks that `output` and every input are `(N, _)` with the same `N`.
fn check_batch(output: &Tensor, inputs: &[&Tensor]) -> Result<i64> {
    if inputs.is_empty() {
        return Err(Error::InvalidParameter(
            "at least one derivative variable is required".into(),
        ));
    }
    let n = batch_size(output)?;
    for input in inputs {
        let m = batch_size(input)?;
        if m != n {
            return Err(Error::ShapeMismatch {
                expected: vec![n as usize, width(input) as usize],
                found: shape(input),
            });
        }
    }
    Ok(n)
}

fn width(t: &Tensor) -> i64 {
    t.size()[1]
}

fn total_dim(inputs: &[&Tensor]) -> i64 {
    inputs.iter().map(|t| width(t)).sum()
}

/// Gradient of a scalar-per-row output.
///
/// The result concatenates ∂u/∂input_i over the inputs, in argument order.
pub fn grad(output: &Tensor, inputs: &[&Tensor]) -> Result<Tensor> {
    check_batch(output, inputs)?;
    let parts = grad_of_sum(output, inputs)?;
    Ok(Tensor::f_cat(&parts, 1)?)
}

/// Laplacian (trace of the Hessian) summed over all input variables.
///
/// `precomputed` may carry ∂u/∂x when exactly one input is given; it is reused
/// instead of differentiating `output` again. With several inputs it is
/// ignored.
pub fn laplacian(output: &Tensor, inputs: &[&Tensor], precomputed: Option<&Tensor>) -> Result<Tensor> {
    let n = check_batch(output, inputs)?;
    let mut lap = Tensor::f_zeros([n, 1], (output.kind(), output.device()))?;

    for input in inputs {
        let first = match precomputed {
            Some(g) if inputs.len() == 1 => g.shallow_clone(),
            _ => derivative(output, input)?,
        };
        if !first.requires_grad() {
            debug!("laplacian: first derivative is constant in a {:?} input, skipping", input.size());
            continue;
        }
        for i in 0..width(input) {
            let second = derivative(&first.f_narrow(1, i, 1)?, input)?;
            lap = lap + second.f_narrow(1, i, 1)?;
        }
    }
    Ok(lap)
}

/// Divergence of a vector field.
///
/// Output component `k` is paired with column `k` of the inputs concatenated
/// in argument order, so the field must list its components in that order.
/// A field whose width differs from the total input dimension is rejected.
pub fn div(output: &Tensor, inputs: &[&Tensor]) -> Result<Tensor> {
    let n = check_batch(output, inputs)?;
    let total = total_dim(inputs);
    if width(output) != total {
        return Err(Error::ShapeMismatch {
            expected: vec![n as usize, total as usize],
            found: shape(output),
        });
    }

    let mut divergence = Tensor::f_zeros([n, 1], (output.kind(), output.device()))?;
    let mut offset = 0;
    for input in inputs {
        let d = width(input);
        for i in 0..d {
            let du = derivative(&output.f_narrow(1, offset + i, 1)?, input)?;
            divergence = divergence + du.f_narrow(1, i, 1)?;
        }
        offset += d;
    }
    Ok(divergence)
}

/// Jacobian: entry `[n, m, p]` is ∂output_m/∂input_p at row `n`.
pub fn jac(output: &Tensor, inputs: &[&Tensor]) -> Result<Tensor> {
    check_batch(output, inputs)?;
    let rows = (0..width(output))
        .map(|m| {
            let parts = grad_of_sum(&output.f_narrow(1, m, 1)?, inputs)?;
            Ok(Tensor::f_cat(&parts, 1)?)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Tensor::f_stack(&rows, 1)?)
}

/// Curl of a 3-D vector field with respect to 3-D inputs.
///
/// Both the field and the concatenated inputs must have exactly three
/// components.
pub fn rot(output: &Tensor, inputs: &[&Tensor]) -> Result<Tensor> {
    let n = check_batch(output, inputs)?;
    if width(output) != 3 || total_dim(inputs) != 3 {
        return Err(Error::ShapeMismatch {
            expected: vec![n as usize, 3],
            found: vec![width(output) as usize, total_dim(inputs) as usize],
        });
    }
    let j = jac(output, inputs)?;
    let entry = |m: i64, p: i64| -> Result<Tensor> {
        Ok(j.f_narrow(1, m, 1)?.f_narrow(2, p, 1)?.f_reshape([n, 1])?)
    };
    let components = [
        entry(2, 1)? - entry(1, 2)?,
        entry(0, 2)? - entry(2, 0)?,
        entry(1, 0)? - entry(0, 1)?,
    ];
    Ok(Tensor::f_cat(&components, 1)?)
}

/// Repeated (possibly mixed) partial derivative, one step per variable.
///
/// Each step differentiates the sum of the previous result. If an
/// intermediate result no longer depends on any tracked input, every further
/// derivative is zero and a zero tensor shaped like the last variable is
/// returned. With no variables the output itself is returned.
pub fn partial(output: &Tensor, variables: &[&Tensor]) -> Result<Tensor> {
    let Some(last) = variables.last() else {
        return Ok(output.shallow_clone());
    };
    let mut du = output.shallow_clone();
    for (step, variable) in variables.iter().enumerate() {
        if !du.requires_grad() {
            debug!("partial: derivative is constant after {step} step(s), returning zeros");
            return Ok(last.zeros_like());
        }
        du = derivative(&du, variable)?;
    }
    Ok(du)
}

/// Normal derivative ∇u · n, row by row.
pub fn normal_derivative(output: &Tensor, normals: &Tensor, inputs: &[&Tensor]) -> Result<Tensor> {
    let gradient = grad(output, inputs)?;
    if normals.size() != gradient.size() {
        return Err(Error::ShapeMismatch {
            expected: shape(&gradient),
            found: shape(normals),
        });
    }
    Ok(gradient
        .f_mul(normals)?
        .f_sum_dim_intlist([1i64].as_slice(), true, output.kind())?)
}

/// Convective term (v · ∇)u: the Jacobian of `field` applied to `velocity`, per row.
///
/// `velocity` must be `(N, Σ d_i)`; the result is `(N, M)` for an `(N, M)` field.
pub fn convective(field: &Tensor, velocity: &Tensor, inputs: &[&Tensor]) -> Result<Tensor> {
    let n = check_batch(field, inputs)?;
    let p = total_dim(inputs);
    if velocity.size() != [n, p] {
        return Err(Error::ShapeMismatch {
            expected: vec![n as usize, p as usize],
            found: shape(velocity),
        });
    }
    let j = jac(field, inputs)?;
    Ok(j
        .f_mul(&velocity.f_unsqueeze(1)?)?
        .f_sum_dim_intlist([2i64].as_slice(), false, field.kind())?)
}
