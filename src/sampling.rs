//! Sampling primitives shared by the concrete and composite domains.
//!
//! Composite regions are sampled by rejection: propose candidates from a
//! simpler region (a bounding box, a parent domain, an operand's boundary) and
//! keep the ones that pass a containment test. Grids over composite regions
//! are regular grids over the bounding box, refined until enough points fall
//! inside.

use log::{debug, trace};
use ndarray::{Array2, ArrayView2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::domain::{select_rows, vstack, Points};
use crate::{Error, Result};

/// Configuration for rejection sampling and grid refinement.
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Candidates proposed per missing point in each rejection round.
    pub batch_factor: usize,
    /// Rejection rounds before giving up with [`Error::SamplingExhausted`].
    pub max_rounds: usize,
    /// Grid refinements before the remaining points are filled randomly.
    pub grid_refinements: usize,
    /// Upper bound on grid points generated per requested point while refining.
    pub max_grid_factor: usize,
}

/// Candidates used for a Monte Carlo volume estimate.
pub(crate) const VOLUME_SAMPLES: usize = 1024;

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            batch_factor: 4,
            max_rounds: 200,
            grid_refinements: 8,
            max_grid_factor: 64,
        }
    }
}

/// A deterministic generator for reproducible sampling.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `n` uniform points in the box `[lo_1, hi_1, lo_2, hi_2, ...]`.
///
/// Degenerate axes (`lo == hi`) are constant.
pub(crate) fn uniform_in_box(bbox: &[f32], n: usize, rng: &mut dyn RngCore) -> Points {
    let d = bbox.len() / 2;
    Array2::from_shape_fn((n, d), |(_, j)| {
        let (lo, hi) = (bbox[2 * j], bbox[2 * j + 1]);
        lo + (hi - lo) * rng.gen::<f32>()
    })
}

/// `k` evenly spaced values covering `[lo, hi]`, or its midpoint when `k == 1`.
pub(crate) fn linspace(lo: f32, hi: f32, k: usize) -> Vec<f32> {
    match k {
        0 => Vec::new(),
        1 => vec![0.5 * (lo + hi)],
        _ => (0..k)
            .map(|j| lo + (hi - lo) * j as f32 / (k - 1) as f32)
            .collect(),
    }
}

/// All combinations of the per-axis coordinates, first axis slowest.
pub(crate) fn cartesian(axes: &[Vec<f32>]) -> Points {
    let counts: Vec<usize> = axes.iter().map(Vec::len).collect();
    let total: usize = counts.iter().product();
    let mut strides = vec![1usize; axes.len()];
    for j in (0..axes.len().saturating_sub(1)).rev() {
        strides[j] = strides[j + 1] * counts[j + 1];
    }
    Array2::from_shape_fn((total, axes.len()), |(r, j)| axes[j][(r / strides[j]) % counts[j]])
}

/// A regular grid over the box with roughly `n` points.
///
/// The spacing is the same along every non-degenerate axis, so the count per
/// axis follows the side lengths.
pub(crate) fn grid_in_box(bbox: &[f32], n: usize) -> Points {
    let d = bbox.len() / 2;
    let lengths: Vec<f32> = (0..d).map(|j| (bbox[2 * j + 1] - bbox[2 * j]).max(0.0)).collect();
    let active: Vec<f32> = lengths.iter().copied().filter(|&l| l > 0.0).collect();
    let counts: Vec<usize> = if active.is_empty() || n == 0 {
        vec![usize::from(n > 0); d]
    } else {
        let volume: f32 = active.iter().product();
        let h = (volume / n as f32).powf(1.0 / active.len() as f32);
        lengths
            .iter()
            .map(|&l| if l > 0.0 { ((l / h).round() as usize).max(1) } else { 1 })
            .collect()
    };
    let axes: Vec<Vec<f32>> = (0..d)
        .map(|j| linspace(bbox[2 * j], bbox[2 * j + 1], counts[j]))
        .collect();
    cartesian(&axes)
}

/// Grid points of the box that pass `accept`, refining the grid until at least
/// `n` pass or the refinements run out. May return fewer than `n` points.
pub(crate) fn filtered_grid(
    bbox: &[f32],
    n: usize,
    accept: &dyn Fn(ArrayView2<'_, f32>) -> Result<Array2<bool>>,
    cfg: &SamplingConfig,
) -> Result<Points> {
    let width = bbox.len() / 2;
    let mut target = n;
    let mut best = Array2::zeros((0, width));
    for round in 0..=cfg.grid_refinements {
        let grid = grid_in_box(bbox, target);
        let mask = accept(grid.view())?;
        let inside = select_rows(&grid.view(), &mask);
        trace!("grid round {round}: {} of {} points inside", inside.nrows(), grid.nrows());
        if inside.nrows() >= n {
            return Ok(inside);
        }
        let found = inside.nrows();
        best = inside;
        match next_grid_target(target, n, found, cfg) {
            Some(next) => target = next,
            None => break,
        }
    }
    Ok(best)
}

/// Grid size for the next refinement after `found` of `n` points passed on a
/// grid of `target` points, or `None` once the cap is reached.
///
/// Growth is bounded by `n * max_grid_factor`: a sparse region then falls
/// back to random filling instead of an ever larger grid.
pub(crate) fn next_grid_target(target: usize, n: usize, found: usize, cfg: &SamplingConfig) -> Option<usize> {
    let cap = n.max(1).saturating_mul(cfg.max_grid_factor.max(1));
    let wanted = match found {
        0 => target.saturating_mul(4),
        found => (target as f64 * n as f64 / found as f64).ceil() as usize + 1,
    };
    let next = wanted.min(cap);
    if next <= target {
        trace!("grid refinement capped at {target} points");
        return None;
    }
    Some(next)
}

/// Exactly `n` points drawn by `propose` that pass `accept`.
///
/// Accepted candidates are kept in proposal order, so independent uniform
/// proposals yield independent uniform samples of the accepted region.
pub(crate) fn rejection_sample(
    n: usize,
    width: usize,
    propose: &mut dyn FnMut(usize, &mut dyn RngCore) -> Result<Points>,
    accept: &dyn Fn(ArrayView2<'_, f32>) -> Result<Array2<bool>>,
    cfg: &SamplingConfig,
    rng: &mut dyn RngCore,
) -> Result<Points> {
    let mut batches = Vec::new();
    let mut found = 0;
    for round in 0..cfg.max_rounds {
        if found >= n {
            break;
        }
        let candidates = propose((n - found).max(1) * cfg.batch_factor.max(1), rng)?;
        let mask = accept(candidates.view())?;
        let kept = select_rows(&candidates.view(), &mask);
        trace!("rejection round {round}: kept {} of {}", kept.nrows(), candidates.nrows());
        found += kept.nrows();
        batches.push(kept);
    }
    if found < n {
        debug!("rejection sampling stopped at {found} of {n} points");
        return Err(Error::SamplingExhausted { requested: n, found });
    }
    let all = vstack(&batches, width)?;
    Ok(all.slice_move(ndarray::s![..n, ..]))
}
