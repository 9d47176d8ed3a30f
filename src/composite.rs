//! Set algebra over domains: union, difference, intersection and open interiors.
//!
//! Composite domains own their operands. Containment is the boolean
//! combination of the operands' containment; sampling is rejection sampling
//! from a simpler proposal region, and grids are bounding-box grids filtered
//! by containment.

use log::debug;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use rand::{Rng, RngCore};

use crate::domain::{check_columns, finish_grid, select_rows, vstack, BoundaryDomain, Domain, Points};
use crate::sampling::{filtered_grid, next_grid_target, rejection_sample, SamplingConfig, VOLUME_SAMPLES};
use crate::space::Space;
use crate::{Error, Result};

/// Which set operation a [`SetDomain`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// `a ∪ b`
    Union,
    /// `a \ b`, closed: points on the boundary of `b` that lie in `a` are kept.
    Difference,
    /// `a ∩ b`
    Intersection,
}

/// Union, difference or intersection of two domains over the same space.
#[derive(Debug, Clone)]
pub struct SetDomain {
    op: SetOp,
    a: Box<dyn Domain>,
    b: Box<dyn Domain>,
    b_boundary: Option<Box<dyn BoundaryDomain>>,
    config: SamplingConfig,
}

impl SetDomain {
    pub fn new(op: SetOp, a: Box<dyn Domain>, b: Box<dyn Domain>) -> Result<Self> {
        if a.dim() != b.dim() {
            return Err(Error::DimensionMismatch {
                expected: a.dim(),
                found: b.dim(),
            });
        }
        if a.space() != b.space() {
            return Err(Error::SpaceMismatch {
                expected: a.space().clone(),
                found: b.space().clone(),
            });
        }
        let b_boundary = match op {
            SetOp::Difference => b.boundary().ok(),
            SetOp::Union | SetOp::Intersection => None,
        };
        if op == SetOp::Difference && b_boundary.is_none() {
            debug!("subtracted domain has no boundary; difference is open along it");
        }
        Ok(Self {
            op,
            a,
            b,
            b_boundary,
            config: SamplingConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SamplingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn op(&self) -> SetOp {
        self.op
    }

    /// The left and right operands.
    pub fn operands(&self) -> (&dyn Domain, &dyn Domain) {
        (self.a.as_ref(), self.b.as_ref())
    }
}

impl Domain for SetDomain {
    fn space(&self) -> &Space {
        self.a.space()
    }

    fn dim(&self) -> usize {
        self.a.dim()
    }

    fn tol(&self) -> f32 {
        self.a.tol().min(self.b.tol())
    }

    fn is_initialized(&self) -> bool {
        self.a.is_initialized() && self.b.is_initialized()
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(self.space(), &points)?;
        let ia = self.a.is_inside(points)?;
        let ib = self.b.is_inside(points)?;
        let inside = match self.op {
            SetOp::Union => ia | ib,
            SetOp::Intersection => ia & ib,
            SetOp::Difference => match &self.b_boundary {
                Some(edge) => ia & (!ib | edge.is_inside(points)?),
                None => ia & !ib,
            },
        };
        Ok(inside)
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        let ba = self.a.bounding_box()?;
        if self.op == SetOp::Difference {
            return Ok(ba);
        }
        let bb = self.b.bounding_box()?;
        let mut bbox = Vec::with_capacity(ba.len());
        for (pa, pb) in ba.chunks(2).zip(bb.chunks(2)) {
            let (lo, hi) = match self.op {
                SetOp::Union => (pa[0].min(pb[0]), pa[1].max(pb[1])),
                _ => {
                    let lo = pa[0].max(pb[0]);
                    (lo, pa[1].min(pb[1]).max(lo))
                }
            };
            bbox.push(lo);
            bbox.push(hi);
        }
        Ok(bbox)
    }

    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let grid = filtered_grid(&self.bounding_box()?, n, &|p| self.is_inside(p), &self.config)?;
        finish_grid(self, grid, n, rng)
    }

    /// Rejection sampling from the operands.
    ///
    /// A union proposes from each operand in proportion to its volume and
    /// drops the candidates of `b` that `a` already covers. A difference
    /// proposes from `a`, an intersection from the smaller operand. A region
    /// without volume (say, two rectangles sharing an edge) cannot be hit by
    /// such proposals; its points are then drawn from the filtered grid.
    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let sampled = match self.op {
            SetOp::Union => self.sample_union(n, rng),
            SetOp::Difference => self.sample_from(self.a.as_ref(), n, rng),
            SetOp::Intersection => {
                let (va, vb) = (self.a.volume(rng)?, self.b.volume(rng)?);
                let smaller = if vb < va { self.b.as_ref() } else { self.a.as_ref() };
                self.sample_from(smaller, n, rng)
            }
        };
        match sampled {
            Err(Error::SamplingExhausted { found, .. }) => {
                debug!("{:?}: rejection found {found} of {n} points, drawing from the grid", self.op);
                self.sample_from_grid(n, rng)
            }
            other => other,
        }
    }

    fn volume(&self, rng: &mut dyn RngCore) -> Result<f64> {
        let va = self.a.volume(rng)?;
        if va == 0.0 {
            return match self.op {
                SetOp::Union => self.b.volume(rng),
                SetOp::Difference | SetOp::Intersection => Ok(0.0),
            };
        }
        let candidates = self.a.sample_random_uniform(VOLUME_SAMPLES, rng)?;
        let share_in_b = fraction(&self.b.is_inside(candidates.view())?);
        Ok(match self.op {
            SetOp::Union => va + self.b.volume(rng)? - va * share_in_b,
            SetOp::Difference => va * (1.0 - share_in_b),
            SetOp::Intersection => va * share_in_b,
        })
    }

    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Ok(Box::new(SetBoundary::new(self.clone())?))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

impl SetDomain {
    fn sample_from(&self, proposal: &dyn Domain, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        rejection_sample(
            n,
            self.space().dim(),
            &mut |k, rng| proposal.sample_random_uniform(k, rng),
            &|p| self.is_inside(p),
            &self.config,
            rng,
        )
    }

    fn sample_union(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let width = self.space().dim();
        let (va, vb) = (self.a.volume(rng)?, self.b.volume(rng)?);
        let share_a = if va + vb > 0.0 { (va / (va + vb)).clamp(0.0, 1.0) } else { 0.5 };
        let mut propose = |k: usize, rng: &mut dyn RngCore| -> Result<Points> {
            let k_a = (0..k).filter(|_| rng.gen_bool(share_a)).count();
            let from_a = self.a.sample_random_uniform(k_a, rng)?;
            let from_b = self.b.sample_random_uniform(k - k_a, rng)?;
            // the overlap is covered by `a`
            let outside_a = !self.a.is_inside(from_b.view())?;
            let from_b = select_rows(&from_b.view(), &outside_a);
            Ok(shuffled(vstack(&[from_a, from_b], width)?, rng))
        };
        rejection_sample(n, width, &mut propose, &accept_all, &self.config, rng)
    }

    /// `n` rows drawn with replacement from the filtered bounding-box grid.
    fn sample_from_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let grid = filtered_grid(&self.bounding_box()?, n, &|p| self.is_inside(p), &self.config)?;
        if grid.nrows() == 0 {
            return Err(Error::SamplingExhausted { requested: n, found: 0 });
        }
        let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..grid.nrows())).collect();
        Ok(grid.select(Axis(0), &rows))
    }
}

/// Share of `true` rows in a mask.
fn fraction(mask: &Array2<bool>) -> f64 {
    match mask.nrows() {
        0 => 0.0,
        rows => mask.iter().filter(|&&b| b).count() as f64 / rows as f64,
    }
}

/// Candidates that were filtered while being proposed.
fn accept_all(points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
    Ok(Array2::from_elem((points.nrows(), 1), true))
}

/// The rows in random order, so truncation does not favor either source.
fn shuffled(points: Points, rng: &mut dyn RngCore) -> Points {
    let order = rand::seq::index::sample(rng, points.nrows(), points.nrows()).into_vec();
    points.select(Axis(0), &order)
}

/// The boundary of a [`SetDomain`]: the parts of each operand's boundary that
/// bound the composite region.
///
/// Normals come from the operand the point belongs to; for a difference the
/// normals taken from the subtracted operand are flipped.
#[derive(Debug, Clone)]
pub struct SetBoundary {
    set: SetDomain,
    a_edge: Box<dyn BoundaryDomain>,
    b_edge: Box<dyn BoundaryDomain>,
}

/// Per-point membership of both operands and their boundaries.
struct Membership {
    in_a: Array2<bool>,
    in_b: Array2<bool>,
    on_a: Array2<bool>,
    on_b: Array2<bool>,
}

impl Membership {
    fn strictly_in_a(&self) -> Array2<bool> {
        &self.in_a & &!&self.on_a
    }

    fn strictly_in_b(&self) -> Array2<bool> {
        &self.in_b & &!&self.on_b
    }
}

impl SetBoundary {
    pub fn new(set: SetDomain) -> Result<Self> {
        let a_edge = set.a.boundary()?;
        let b_edge = set.b.boundary()?;
        Ok(Self { set, a_edge, b_edge })
    }

    fn membership(&self, points: ArrayView2<'_, f32>) -> Result<Membership> {
        Ok(Membership {
            in_a: self.set.a.is_inside(points)?,
            in_b: self.set.b.is_inside(points)?,
            on_a: self.a_edge.is_inside(points)?,
            on_b: self.b_edge.is_inside(points)?,
        })
    }

    /// Points of `∂a` that bound the composite region.
    fn from_a(&self, m: &Membership) -> Array2<bool> {
        match self.set.op {
            SetOp::Union | SetOp::Difference => &m.on_a & &!m.strictly_in_b(),
            SetOp::Intersection => &m.on_a & &m.in_b,
        }
    }

    /// Points of `∂b` that bound the composite region.
    fn from_b(&self, m: &Membership) -> Array2<bool> {
        match self.set.op {
            SetOp::Union => &m.on_b & &!m.strictly_in_a(),
            SetOp::Difference | SetOp::Intersection => &m.on_b & &m.in_a,
        }
    }

    /// The rows of points drawn from `∂a` and `∂b` that lie on this boundary.
    fn keep_on_boundary(&self, points_a: Points, points_b: Points) -> Result<Points> {
        let m_a = self.membership(points_a.view())?;
        let m_b = self.membership(points_b.view())?;
        let keep_a = select_rows(&points_a.view(), &self.from_a(&m_a));
        let keep_b = select_rows(&points_b.view(), &self.from_b(&m_b));
        vstack(&[keep_a, keep_b], self.space().dim())
    }
}

impl Domain for SetBoundary {
    fn space(&self) -> &Space {
        self.set.space()
    }

    fn dim(&self) -> usize {
        self.set.dim().saturating_sub(1)
    }

    fn tol(&self) -> f32 {
        self.set.tol()
    }

    fn is_initialized(&self) -> bool {
        self.set.is_initialized()
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(self.space(), &points)?;
        let m = self.membership(points)?;
        Ok(self.from_a(&m) | self.from_b(&m))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        self.set.bounding_box()
    }

    /// Grids of both operand boundaries, filtered and refined like the
    /// bounding-box grids of [`SetDomain`].
    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let width = self.space().dim();
        let mut target = n;
        let mut best = Array2::zeros((0, width));
        for _ in 0..=self.set.config.grid_refinements {
            let grid_a = self.a_edge.sample_grid(target, rng)?;
            let grid_b = self.b_edge.sample_grid(target, rng)?;
            best = self.keep_on_boundary(grid_a, grid_b)?;
            if best.nrows() >= n {
                break;
            }
            match next_grid_target(target, n, best.nrows(), &self.set.config) {
                Some(next) => target = next,
                None => break,
            }
        }
        finish_grid(self, best, n, rng)
    }

    /// Each candidate comes from either operand boundary with equal chance.
    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let width = self.space().dim();
        let mut propose = |k: usize, rng: &mut dyn RngCore| -> Result<Points> {
            let k_a = (0..k).filter(|_| rng.gen_bool(0.5)).count();
            let points_a = self.a_edge.sample_random_uniform(k_a, rng)?;
            let points_b = self.b_edge.sample_random_uniform(k - k_a, rng)?;
            Ok(shuffled(self.keep_on_boundary(points_a, points_b)?, rng))
        };
        rejection_sample(n, width, &mut propose, &accept_all, &self.set.config, rng)
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

impl BoundaryDomain for SetBoundary {
    fn normal(&self, points: ArrayView2<'_, f32>) -> Result<Points> {
        check_columns(self.space(), &points)?;
        let m = self.membership(points)?;
        let use_a = self.from_a(&m);
        let n_a = self.a_edge.normal(points)?;
        let n_b = self.b_edge.normal(points)?;
        let flip = if self.set.op == SetOp::Difference { -1.0 } else { 1.0 };
        let mut normals = n_a;
        Zip::from(normals.rows_mut())
            .and(n_b.rows())
            .and(use_a.rows())
            .for_each(|mut row, nb, from_a| {
                if !from_a[0] {
                    row.zip_mut_with(&nb, |v, &w| *v = flip * w);
                }
            });
        Ok(normals)
    }

    fn clone_boundary(&self) -> Box<dyn BoundaryDomain> {
        Box::new(self.clone())
    }
}

/// The open interior of a domain: its points minus its boundary.
#[derive(Debug, Clone)]
pub struct Inner {
    parent: Box<dyn Domain>,
    edge: Box<dyn BoundaryDomain>,
    config: SamplingConfig,
}

impl Inner {
    /// Fails if `parent` has no boundary.
    pub fn new(parent: Box<dyn Domain>) -> Result<Self> {
        let edge = parent.boundary()?;
        Ok(Self {
            parent,
            edge,
            config: SamplingConfig::default(),
        })
    }

    pub fn with_config(mut self, config: SamplingConfig) -> Self {
        self.config = config;
        self
    }
}

impl Domain for Inner {
    fn space(&self) -> &Space {
        self.parent.space()
    }

    fn dim(&self) -> usize {
        self.parent.dim()
    }

    fn tol(&self) -> f32 {
        self.parent.tol()
    }

    fn is_initialized(&self) -> bool {
        self.parent.is_initialized()
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        Ok(self.parent.is_inside(points)? & !self.edge.is_inside(points)?)
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        self.parent.bounding_box()
    }

    /// The parent's grid without its boundary rows, topped up randomly.
    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let grid = self.parent.sample_grid(n, rng)?;
        let interior = select_rows(&grid.view(), &!self.edge.is_inside(grid.view())?);
        finish_grid(self, interior, n, rng)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        rejection_sample(
            n,
            self.space().dim(),
            &mut |k, rng| self.parent.sample_random_uniform(k, rng),
            &|p| self.is_inside(p),
            &self.config,
            rng,
        )
    }

    fn volume(&self, rng: &mut dyn RngCore) -> Result<f64> {
        self.parent.volume(rng)
    }

    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Ok(self.edge.clone())
    }

    fn inner(&self) -> Result<Box<dyn Domain>> {
        Ok(self.clone_box())
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}
