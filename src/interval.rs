//! One-dimensional intervals.

use ndarray::{Array2, ArrayView2};
use rand::{Rng, RngCore};

use crate::domain::{check_columns, mask_rows, scaled_tol, BoundaryDomain, Domain, Points};
use crate::lambda::{LambdaDomain, Param};
use crate::sampling::{linspace, uniform_in_box};
use crate::space::Space;
use crate::{Error, Result, DEFAULT_TOL};

/// The closed interval `[lower, upper]` of a one-dimensional variable.
#[derive(Debug, Clone)]
pub struct Interval {
    space: Space,
    lower: f32,
    upper: f32,
    tol: f32,
}

impl Interval {
    pub fn new(space: Space, lower: f32, upper: f32) -> Result<Self> {
        if space.dim() != 1 {
            return Err(Error::DimensionMismatch {
                expected: 1,
                found: space.dim(),
            });
        }
        if lower.is_nan() || upper.is_nan() || lower >= upper {
            return Err(Error::InvalidParameter(format!(
                "interval bounds must satisfy lower < upper, got [{lower}, {upper}]"
            )));
        }
        Ok(Self {
            space,
            lower,
            upper,
            tol: DEFAULT_TOL,
        })
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    pub fn lower(&self) -> f32 {
        self.lower
    }

    pub fn upper(&self) -> f32 {
        self.upper
    }

    fn band(&self) -> f32 {
        scaled_tol(self.tol, self.lower.abs().max(self.upper.abs()))
    }

    /// Intervals whose bounds are resolved per point.
    ///
    /// ```
    /// use pinn::{Domain, Interval, Param, Space};
    ///
    /// // [0, 1 + t]
    /// let family = Interval::lambda(Space::var("x", 1), 0.0f32, Param::computed(|t| 1.0 + t[0]));
    /// let at_one = family.instantiate(&[1.0]).unwrap();
    /// assert_eq!(at_one.bounding_box().unwrap(), vec![0.0, 2.0]);
    /// ```
    pub fn lambda(space: Space, lower: impl Into<Param>, upper: impl Into<Param>) -> LambdaDomain {
        LambdaDomain::new(space, 1, |params, space, tol| {
            let interval = Interval::new(space, params.scalar("lower_bound")?, params.scalar("upper_bound")?)?;
            Ok(Box::new(interval.with_tol(tol)) as Box<dyn Domain>)
        })
        .with_param("lower_bound", lower)
        .with_param("upper_bound", upper)
    }
}

impl Domain for Interval {
    fn space(&self) -> &Space {
        &self.space
    }

    fn dim(&self) -> usize {
        1
    }

    fn tol(&self) -> f32 {
        self.tol
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(&self.space, &points)?;
        let band = self.band();
        let (lo, hi) = (self.lower - band, self.upper + band);
        Ok(mask_rows(&points, |p| (lo..=hi).contains(&p[0])))
    }

    fn volume(&self, _rng: &mut dyn RngCore) -> Result<f64> {
        Ok(f64::from(self.upper - self.lower))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        Ok(vec![self.lower, self.upper])
    }

    fn sample_grid(&self, n: usize, _rng: &mut dyn RngCore) -> Result<Points> {
        let values = linspace(self.lower, self.upper, n);
        Ok(Array2::from_shape_vec((n, 1), values)?)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        Ok(uniform_in_box(&[self.lower, self.upper], n, rng))
    }

    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Ok(Box::new(IntervalBoundary {
            interval: self.clone(),
        }))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

/// The two endpoints of an [`Interval`].
#[derive(Debug, Clone)]
pub struct IntervalBoundary {
    interval: Interval,
}

impl IntervalBoundary {
    fn endpoint(&self, upper: bool) -> f32 {
        if upper {
            self.interval.upper
        } else {
            self.interval.lower
        }
    }
}

impl Domain for IntervalBoundary {
    fn space(&self) -> &Space {
        &self.interval.space
    }

    fn dim(&self) -> usize {
        0
    }

    fn tol(&self) -> f32 {
        self.interval.tol
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(self.space(), &points)?;
        let Interval { lower, upper, .. } = self.interval;
        let band = self.interval.band();
        Ok(mask_rows(&points, |p| {
            (p[0] - lower).abs() <= band || (p[0] - upper).abs() <= band
        }))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        self.interval.bounding_box()
    }

    /// Alternates between the lower and the upper endpoint.
    fn sample_grid(&self, n: usize, _rng: &mut dyn RngCore) -> Result<Points> {
        Ok(Array2::from_shape_fn((n, 1), |(i, _)| self.endpoint(i % 2 == 1)))
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        Ok(Array2::from_shape_fn((n, 1), |_| self.endpoint(rng.gen_bool(0.5))))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

impl BoundaryDomain for IntervalBoundary {
    fn normal(&self, points: ArrayView2<'_, f32>) -> Result<Points> {
        check_columns(self.space(), &points)?;
        let mid = 0.5 * (self.interval.lower + self.interval.upper);
        Ok(Array2::from_shape_fn((points.nrows(), 1), |(i, _)| {
            if points[[i, 0]] < mid {
                -1.0
            } else {
                1.0
            }
        }))
    }

    fn clone_boundary(&self) -> Box<dyn BoundaryDomain> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeded_rng;
    use ndarray::array;

    fn unit() -> Interval {
        Interval::new(Space::var("t", 1), 0.0, 1.0).unwrap()
    }

    #[test]
    fn rejects_bad_bounds_and_spaces() {
        assert!(Interval::new(Space::var("t", 1), 1.0, 1.0).is_err());
        assert!(Interval::new(Space::var("t", 1), f32::NAN, 1.0).is_err());
        assert!(matches!(
            Interval::new(Space::var("x", 2), 0.0, 1.0),
            Err(Error::DimensionMismatch { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn containment_is_closed_up_to_tol() {
        let line = unit();
        let inside = line.is_inside(array![[-1e-6f32], [0.5], [1.0], [1.1]].view()).unwrap();
        assert_eq!(inside.column(0).to_vec(), vec![true, true, true, false]);
    }

    #[test]
    fn grid_hits_both_ends() {
        let mut rng = seeded_rng(0);
        let grid = unit().sample_grid(5, &mut rng).unwrap();
        assert_eq!(grid.column(0).to_vec(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn random_points_are_inside() {
        let mut rng = seeded_rng(1);
        let line = unit();
        let points = line.sample_random_uniform(100, &mut rng).unwrap();
        assert_eq!(points.nrows(), 100);
        assert!(line.is_inside(points.view()).unwrap().iter().all(|&b| b));
    }

    #[test]
    fn boundary_is_two_points() {
        let mut rng = seeded_rng(2);
        let ends = unit().boundary().unwrap();
        assert_eq!(ends.dim(), 0);
        let points = ends.sample_random_uniform(20, &mut rng).unwrap();
        assert!(points.iter().all(|&x| x == 0.0 || x == 1.0));
        let normals = ends.normal(array![[0.0f32], [1.0]].view()).unwrap();
        assert_eq!(normals, array![[-1.0f32], [1.0]]);
        let grid = ends.sample_grid(3, &mut rng).unwrap();
        assert_eq!(grid.column(0).to_vec(), vec![0.0, 1.0, 0.0]);
    }
}
