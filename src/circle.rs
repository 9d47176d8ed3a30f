//! Disks and circles in the plane.

use std::f32::consts::TAU;

use ndarray::{Array2, ArrayView2};
use rand::RngCore;
use rand_distr::{Distribution, Uniform};

use crate::domain::{check_columns, finish_grid, mask_rows, scaled_tol, BoundaryDomain, Domain, Points};
use crate::lambda::{LambdaDomain, Param};
use crate::sampling::{filtered_grid, SamplingConfig};
use crate::space::Space;
use crate::{Error, Result, DEFAULT_TOL};

/// The closed disk of radius `radius` around `center`.
#[derive(Debug, Clone)]
pub struct Circle {
    space: Space,
    center: [f32; 2],
    radius: f32,
    tol: f32,
}

impl Circle {
    pub fn new(space: Space, center: [f32; 2], radius: f32) -> Result<Self> {
        if space.dim() != 2 {
            return Err(Error::DimensionMismatch {
                expected: 2,
                found: space.dim(),
            });
        }
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(Error::InvalidParameter(format!("radius must be positive, got {radius}")));
        }
        Ok(Self {
            space,
            center,
            radius,
            tol: DEFAULT_TOL,
        })
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    pub fn center(&self) -> [f32; 2] {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Disks whose center and radius are resolved per point.
    pub fn lambda(space: Space, center: impl Into<Param>, radius: impl Into<Param>) -> LambdaDomain {
        LambdaDomain::new(space, 2, |params, space, tol| {
            let disk = Circle::new(space, params.array::<2>("center")?, params.scalar("radius")?)?;
            Ok(Box::new(disk.with_tol(tol)) as Box<dyn Domain>)
        })
        .with_param("center", center)
        .with_param("radius", radius)
    }

    /// Membership band for the disk and its circle, widened with the distance
    /// from the origin.
    fn band(&self) -> f32 {
        let [cx, cy] = self.center;
        scaled_tol(self.tol, cx.abs().max(cy.abs()) + self.radius)
    }

    fn distance(&self, x: f32, y: f32) -> f32 {
        (x - self.center[0]).hypot(y - self.center[1])
    }

    /// Points `center + r (cos θ, sin θ)`, one per angle.
    fn polar(&self, samples: impl Iterator<Item = (f32, f32)>, n: usize) -> Result<Points> {
        let [cx, cy] = self.center;
        let flat: Vec<f32> = samples
            .flat_map(|(r, theta)| [cx + r * theta.cos(), cy + r * theta.sin()])
            .collect();
        Ok(Array2::from_shape_vec((n, 2), flat)?)
    }
}

impl Domain for Circle {
    fn space(&self) -> &Space {
        &self.space
    }

    fn dim(&self) -> usize {
        2
    }

    fn tol(&self) -> f32 {
        self.tol
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(&self.space, &points)?;
        let limit = self.radius + self.band();
        Ok(mask_rows(&points, |p| self.distance(p[0], p[1]) <= limit))
    }

    fn volume(&self, _rng: &mut dyn RngCore) -> Result<f64> {
        Ok(std::f64::consts::PI * f64::from(self.radius).powi(2))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        let [cx, cy] = self.center;
        let r = self.radius;
        Ok(vec![cx - r, cx + r, cy - r, cy + r])
    }

    /// The square grid over the bounding box, restricted to the disk.
    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let grid = filtered_grid(&self.bounding_box()?, n, &|p| self.is_inside(p), &SamplingConfig::default())?;
        finish_grid(self, grid, n, rng)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let unit = Uniform::new(0.0f32, 1.0);
        let angle = Uniform::new(0.0f32, TAU);
        // sqrt makes the density uniform in area
        let samples: Vec<(f32, f32)> = (0..n)
            .map(|_| (self.radius * unit.sample(rng).sqrt(), angle.sample(rng)))
            .collect();
        self.polar(samples.into_iter(), n)
    }

    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Ok(Box::new(CircleBoundary { disk: self.clone() }))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

/// The circle bounding a [`Circle`] disk.
#[derive(Debug, Clone)]
pub struct CircleBoundary {
    disk: Circle,
}

impl Domain for CircleBoundary {
    fn space(&self) -> &Space {
        &self.disk.space
    }

    fn dim(&self) -> usize {
        1
    }

    fn tol(&self) -> f32 {
        self.disk.tol
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(self.space(), &points)?;
        let (radius, band) = (self.disk.radius, self.disk.band());
        Ok(mask_rows(&points, |p| (self.disk.distance(p[0], p[1]) - radius).abs() <= band))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        self.disk.bounding_box()
    }

    /// Equally spaced angles starting at angle zero.
    fn sample_grid(&self, n: usize, _rng: &mut dyn RngCore) -> Result<Points> {
        let step = TAU / n.max(1) as f32;
        let r = self.disk.radius;
        self.disk.polar((0..n).map(|i| (r, i as f32 * step)), n)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let angle = Uniform::new(0.0f32, TAU);
        let r = self.disk.radius;
        let samples: Vec<(f32, f32)> = (0..n).map(|_| (r, angle.sample(rng))).collect();
        self.disk.polar(samples.into_iter(), n)
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

impl BoundaryDomain for CircleBoundary {
    fn normal(&self, points: ArrayView2<'_, f32>) -> Result<Points> {
        check_columns(self.space(), &points)?;
        let [cx, cy] = self.disk.center;
        let mut normals = Array2::zeros((points.nrows(), 2));
        for (i, p) in points.rows().into_iter().enumerate() {
            let (dx, dy) = (p[0] - cx, p[1] - cy);
            let norm = dx.hypot(dy);
            // the center has no direction of its own
            let (nx, ny) = if norm > f32::EPSILON { (dx / norm, dy / norm) } else { (1.0, 0.0) };
            normals[[i, 0]] = nx;
            normals[[i, 1]] = ny;
        }
        Ok(normals)
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

    fn disk() -> Circle {
        Circle::new(Space::var("x", 2), [1.0, 2.0], 0.5).unwrap()
    }

    #[test]
    fn rejects_bad_radius() {
        assert!(Circle::new(Space::var("x", 2), [0.0, 0.0], 0.0).is_err());
        assert!(Circle::new(Space::var("x", 2), [0.0, 0.0], f32::INFINITY).is_err());
        assert!(Circle::new(Space::var("x", 1), [0.0, 0.0], 1.0).is_err());
    }

    #[test]
    fn random_points_fill_the_disk() {
        let d = disk();
        let mut rng = seeded_rng(4);
        let points = d.sample_random_uniform(2000, &mut rng).unwrap();
        assert!(d.is_inside(points.view()).unwrap().iter().all(|&b| b));
        // uniform in area: about a quarter of the points within half the radius
        let near = points
            .rows()
            .into_iter()
            .filter(|p| d.distance(p[0], p[1]) < 0.25)
            .count();
        let share = near as f32 / 2000.0;
        assert!((share - 0.25).abs() < 0.05, "share {share}");
    }

    #[test]
    fn grid_is_exact_and_inside() {
        let d = disk();
        let mut rng = seeded_rng(5);
        for n in [1, 10, 97, 300] {
            let grid = d.sample_grid(n, &mut rng).unwrap();
            assert_eq!(grid.nrows(), n);
            assert!(d.is_inside(grid.view()).unwrap().iter().all(|&b| b));
        }
    }

    #[test]
    fn boundary_points_and_normals() {
        let ring = disk().boundary().unwrap();
        let mut rng = seeded_rng(6);
        assert_eq!(ring.dim(), 1);
        let points = ring.sample_random_uniform(64, &mut rng).unwrap();
        assert!(ring.is_inside(points.view()).unwrap().iter().all(|&b| b));
        let normals = ring.normal(points.view()).unwrap();
        for (p, n) in points.rows().into_iter().zip(normals.rows()) {
            assert!((n[0].hypot(n[1]) - 1.0).abs() < 1e-5);
            // outward: parallel to p - c
            assert!((p[0] - 1.0) * n[0] + (p[1] - 2.0) * n[1] > 0.0);
        }
        let at_right = ring.normal(array![[1.5f32, 2.0]].view()).unwrap();
        assert_eq!(at_right, array![[1.0f32, 0.0]]);
    }

    #[test]
    fn circles_far_from_the_origin_keep_their_samples() {
        let mut rng = seeded_rng(7);
        for (center, radius) in [([1000.0f32, 0.0], 1.0f32), ([-500.0, 750.0], 0.3)] {
            let d = Circle::new(Space::var("x", 2), center, radius).unwrap();
            let ring = d.boundary().unwrap();
            for points in [
                ring.sample_random_uniform(200, &mut rng).unwrap(),
                ring.sample_grid(200, &mut rng).unwrap(),
            ] {
                assert!(ring.is_inside(points.view()).unwrap().iter().all(|&b| b), "{center:?}");
            }
            let disk_points = d.sample_random_uniform(200, &mut rng).unwrap();
            assert!(d.is_inside(disk_points.view()).unwrap().iter().all(|&b| b));

            // the band still separates the circle from its neighborhood
            let [cx, cy] = center;
            let off = array![[cx + 1.01 * radius, cy], [cx, cy]];
            assert_eq!(ring.is_inside(off.view()).unwrap().column(0).to_vec(), vec![false, false]);
        }
    }

    #[test]
    fn volume_is_the_area() {
        let area = disk().volume(&mut seeded_rng(0)).unwrap();
        assert!((area - std::f64::consts::PI * 0.25).abs() < 1e-9);
    }
}
