//! The domain contract and its algebra.
//!
//! A [`Domain`] is an immutable region of a named [`Space`]. Composition never
//! mutates its operands; it moves (or clones) them into a new domain:
//!
//! | Expression | Result |
//! |------------|--------|
//! | `a + b` | [`SetDomain`] union (same space required) |
//! | `a - b` | [`SetDomain`] difference (same space required) |
//! | `a & b` | [`SetDomain`] intersection (same space required) |
//! | `a * b` | [`ProductDomain`] (dimensions add) |
//!
//! All four return [`Result`]; a dimension or space mismatch is reported,
//! never padded or truncated away.
//!
//! Sampling calls take the random source explicitly. Pass a seeded generator
//! (see [`seeded_rng`](crate::seeded_rng)) for reproducible points, or
//! `rand::thread_rng()` for the process-wide one.

use std::fmt;
use std::ops::{Add, BitAnd, Mul, Sub};

use log::debug;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::RngCore;

use crate::composite::{Inner, SetDomain, SetOp};
use crate::product::ProductDomain;
use crate::sampling::{uniform_in_box, VOLUME_SAMPLES};
use crate::space::{PointBatch, Space, VariablePoints};
use crate::{Error, Result};

/// A batch of points, one per row, with one column per space axis.
pub type Points = Array2<f32>;

/// A region of a [`Space`] that can be tested for containment and sampled.
pub trait Domain: fmt::Debug {
    /// The coordinate system the domain lives in.
    fn space(&self) -> &Space;

    /// Intrinsic dimension (one less than the space for a boundary).
    fn dim(&self) -> usize;

    /// Tolerance used for boundary membership.
    fn tol(&self) -> f32;

    /// Whether every defining parameter is resolved. Parametrized domains
    /// report `false` until they are instantiated.
    fn is_initialized(&self) -> bool {
        true
    }

    /// For every row of `points`, whether it lies in the domain. Shape `(N, 1)`.
    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>>;

    /// `[min_1, max_1, min_2, max_2, ...]` in space axis order.
    fn bounding_box(&self) -> Result<Vec<f32>>;

    /// Exactly `n` points on a (best-effort) regular grid.
    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points>;

    /// Exactly `n` independent uniformly distributed points.
    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points>;

    /// Lebesgue measure of the region in its space (length, area, volume).
    ///
    /// The default is a Monte Carlo estimate over the bounding box; shapes
    /// with a closed form override it. Regions of lower dimension than their
    /// space, such as boundaries, have measure zero.
    fn volume(&self, rng: &mut dyn RngCore) -> Result<f64> {
        if self.dim() < self.space().dim() {
            return Ok(0.0);
        }
        let bbox = self.bounding_box()?;
        let box_volume: f64 = bbox.chunks(2).map(|side| f64::from(side[1] - side[0])).product();
        if box_volume <= 0.0 {
            return Ok(0.0);
        }
        let candidates = uniform_in_box(&bbox, VOLUME_SAMPLES, rng);
        let hits = self.is_inside(candidates.view())?.iter().filter(|&&inside| inside).count();
        Ok(box_volume * hits as f64 / VOLUME_SAMPLES as f64)
    }

    /// The boundary of the domain, with outward normals.
    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Err(Error::NotImplemented("boundary"))
    }

    /// The open interior: the domain without its boundary.
    fn inner(&self) -> Result<Box<dyn Domain>> {
        Ok(Box::new(Inner::new(self.clone_box())?))
    }

    fn clone_box(&self) -> Box<dyn Domain>;

    /// Split `(N, space_dim)` points into per-variable blocks.
    fn divide_points_to_space_variables(&self, points: ArrayView2<'_, f32>) -> Result<VariablePoints> {
        self.space().split(points)
    }

    /// Concatenate per-variable blocks back into `(N, space_dim)` points.
    /// Flat batches are returned unchanged.
    fn return_space_variables_to_point_list(&self, batch: PointBatch) -> Result<Points> {
        batch.into_flat()
    }

    /// [`Domain::is_inside`] for a single point, promoted to a batch of one.
    fn is_inside_point(&self, point: &[f32]) -> Result<Array2<bool>> {
        self.is_inside(as_batch(point)?)
    }
}

/// The boundary of a domain.
pub trait BoundaryDomain: Domain {
    /// Outward unit normal at every row of `points`, shape `(N, space_dim)`.
    ///
    /// Points are expected to lie on the boundary (within `tol`). Off-boundary
    /// points still get a finite vector, taken from the nearest boundary part.
    fn normal(&self, points: ArrayView2<'_, f32>) -> Result<Points>;

    fn clone_boundary(&self) -> Box<dyn BoundaryDomain>;
}

impl Clone for Box<dyn Domain> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl Clone for Box<dyn BoundaryDomain> {
    fn clone(&self) -> Self {
        self.clone_boundary()
    }
}

impl Add for Box<dyn Domain> {
    type Output = Result<Box<dyn Domain>>;

    fn add(self, rhs: Self) -> Self::Output {
        Ok(Box::new(SetDomain::new(SetOp::Union, self, rhs)?))
    }
}

impl Sub for Box<dyn Domain> {
    type Output = Result<Box<dyn Domain>>;

    fn sub(self, rhs: Self) -> Self::Output {
        Ok(Box::new(SetDomain::new(SetOp::Difference, self, rhs)?))
    }
}

impl BitAnd for Box<dyn Domain> {
    type Output = Result<Box<dyn Domain>>;

    fn bitand(self, rhs: Self) -> Self::Output {
        Ok(Box::new(SetDomain::new(SetOp::Intersection, self, rhs)?))
    }
}

impl Mul for Box<dyn Domain> {
    type Output = Result<Box<dyn Domain>>;

    fn mul(self, rhs: Self) -> Self::Output {
        Ok(Box::new(ProductDomain::new(self, rhs)?))
    }
}

/// View a single point as a one-row batch.
pub fn as_batch(point: &[f32]) -> Result<ArrayView2<'_, f32>> {
    Ok(ArrayView2::from_shape((1, point.len()), point)?)
}

/// Fails unless `points` has at least as many columns as `space`.
/// Membership tolerance for coordinates of the given magnitude.
///
/// Single-precision rounding grows with the coordinates, so an absolute `tol`
/// alone rejects exact boundary points far from the origin.
pub(crate) fn scaled_tol(tol: f32, magnitude: f32) -> f32 {
    tol + 8.0 * f32::EPSILON * magnitude.abs()
}

pub(crate) fn check_columns(space: &Space, points: &ArrayView2<'_, f32>) -> Result<()> {
    if points.ncols() < space.dim() {
        return Err(Error::InsufficientColumns {
            expected: space.dim(),
            found: points.ncols(),
        });
    }
    Ok(())
}

/// Row-wise containment from a per-point predicate.
pub(crate) fn mask_rows(points: &ArrayView2<'_, f32>, f: impl Fn(ArrayView1<'_, f32>) -> bool) -> Array2<bool> {
    Array2::from_shape_fn((points.nrows(), 1), |(i, _)| f(points.row(i)))
}

/// The rows of `points` whose mask entry is set.
pub(crate) fn select_rows(points: &ArrayView2<'_, f32>, mask: &Array2<bool>) -> Points {
    let keep: Vec<usize> = mask
        .column(0)
        .iter()
        .enumerate()
        .filter_map(|(i, &inside)| inside.then_some(i))
        .collect();
    points.select(Axis(0), &keep)
}

/// Stack point batches vertically. All batches must have the same width.
pub(crate) fn vstack(batches: &[Points], width: usize) -> Result<Points> {
    if batches.is_empty() {
        return Ok(Array2::zeros((0, width)));
    }
    let views: Vec<ArrayView2<'_, f32>> = batches.iter().map(|b| b.view()).collect();
    Ok(ndarray::concatenate(Axis(0), &views)?)
}

/// Randomly drop rows (without replacement) until `n` remain.
pub(crate) fn cut_points(points: Points, n: usize, rng: &mut dyn RngCore) -> Points {
    if points.nrows() <= n {
        return points;
    }
    debug!("grid overshoot: keeping {n} of {} points", points.nrows());
    let keep = rand::seq::index::sample(rng, points.nrows(), n).into_vec();
    points.select(Axis(0), &keep)
}

/// Top up a grid with uniform random points of `domain` until it has `n` rows.
pub(crate) fn fill_points(domain: &dyn Domain, points: Points, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
    if points.nrows() >= n {
        return Ok(points);
    }
    let missing = n - points.nrows();
    debug!("grid undershoot: adding {missing} random points");
    let extra = domain.sample_random_uniform(missing, rng)?;
    vstack(&[points, extra], domain.space().dim())
}

/// Force a grid sample to exactly `n` points: truncate, then top up.
pub(crate) fn finish_grid(domain: &dyn Domain, points: Points, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
    let points = cut_points(points, n, rng);
    fill_points(domain, points, n, rng)
}
