//! Axis-aligned rectangles.

use ndarray::{Array2, ArrayView2};
use rand::{Rng, RngCore};

use crate::domain::{check_columns, finish_grid, mask_rows, scaled_tol, BoundaryDomain, Domain, Points};
use crate::lambda::{LambdaDomain, Param};
use crate::sampling::{grid_in_box, uniform_in_box};
use crate::space::Space;
use crate::{Error, Result, DEFAULT_TOL};

/// `[x0, x0 + width] × [y0, y0 + height]` in a two-dimensional space.
#[derive(Debug, Clone)]
pub struct Rectangle {
    space: Space,
    origin: [f32; 2],
    width: f32,
    height: f32,
    tol: f32,
}

impl Rectangle {
    pub fn new(space: Space, origin: [f32; 2], width: f32, height: f32) -> Result<Self> {
        if space.dim() != 2 {
            return Err(Error::DimensionMismatch {
                expected: 2,
                found: space.dim(),
            });
        }
        if !(width > 0.0 && height > 0.0) || !origin.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "rectangle needs a finite origin and positive sides, got {origin:?}, {width} × {height}"
            )));
        }
        Ok(Self {
            space,
            origin,
            width,
            height,
            tol: DEFAULT_TOL,
        })
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Rectangles whose corner and sides are resolved per point.
    pub fn lambda(
        space: Space,
        origin: impl Into<Param>,
        width: impl Into<Param>,
        height: impl Into<Param>,
    ) -> LambdaDomain {
        LambdaDomain::new(space, 2, |params, space, tol| {
            let rect = Rectangle::new(
                space,
                params.array::<2>("origin")?,
                params.scalar("width")?,
                params.scalar("height")?,
            )?;
            Ok(Box::new(rect.with_tol(tol)) as Box<dyn Domain>)
        })
        .with_param("origin", origin)
        .with_param("width", width)
        .with_param("height", height)
    }

    fn corners(&self) -> (f32, f32, f32, f32) {
        let [x0, y0] = self.origin;
        (x0, x0 + self.width, y0, y0 + self.height)
    }

    fn band(&self) -> f32 {
        let (x0, x1, y0, y1) = self.corners();
        let magnitude = [x0, x1, y0, y1].iter().fold(0.0f32, |m, v| m.max(v.abs()));
        scaled_tol(self.tol, magnitude)
    }
}

impl Domain for Rectangle {
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
        let (x0, x1, y0, y1) = self.corners();
        let tol = self.band();
        Ok(mask_rows(&points, |p| {
            (x0 - tol..=x1 + tol).contains(&p[0]) && (y0 - tol..=y1 + tol).contains(&p[1])
        }))
    }

    fn volume(&self, _rng: &mut dyn RngCore) -> Result<f64> {
        Ok(f64::from(self.width) * f64::from(self.height))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        let (x0, x1, y0, y1) = self.corners();
        Ok(vec![x0, x1, y0, y1])
    }

    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let grid = grid_in_box(&self.bounding_box()?, n);
        finish_grid(self, grid, n, rng)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        Ok(uniform_in_box(&self.bounding_box()?, n, rng))
    }

    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Ok(Box::new(RectangleBoundary { rect: self.clone() }))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

/// The four edges of a [`Rectangle`], traversed counter-clockwise from the origin.
#[derive(Debug, Clone)]
pub struct RectangleBoundary {
    rect: Rectangle,
}

const EDGE_NORMALS: [[f32; 2]; 4] = [[0.0, -1.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]];

impl RectangleBoundary {
    fn perimeter(&self) -> f32 {
        2.0 * (self.rect.width + self.rect.height)
    }

    /// The point at arc length `s` from the origin corner.
    fn point_at(&self, s: f32) -> [f32; 2] {
        let (x0, x1, y0, y1) = self.rect.corners();
        let (w, h) = (self.rect.width, self.rect.height);
        if s < w {
            [x0 + s, y0]
        } else if s < w + h {
            [x1, y0 + (s - w)]
        } else if s < 2.0 * w + h {
            [x1 - (s - w - h), y1]
        } else {
            [x0, (y1 - (s - 2.0 * w - h)).max(y0)]
        }
    }

    fn points_at(&self, arc: impl Iterator<Item = f32>, n: usize) -> Result<Points> {
        let flat: Vec<f32> = arc.flat_map(|s| self.point_at(s)).collect();
        Ok(Array2::from_shape_vec((n, 2), flat)?)
    }

    /// Index into [`EDGE_NORMALS`] of the edge closest to `(x, y)`.
    fn nearest_edge(&self, x: f32, y: f32) -> usize {
        let (x0, x1, y0, y1) = self.rect.corners();
        let distances = [(y - y0).abs(), (x - x1).abs(), (y - y1).abs(), (x - x0).abs()];
        distances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i)
    }
}

impl Domain for RectangleBoundary {
    fn space(&self) -> &Space {
        &self.rect.space
    }

    fn dim(&self) -> usize {
        1
    }

    fn tol(&self) -> f32 {
        self.rect.tol
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        let near = self.rect.is_inside(points)?;
        let (x0, x1, y0, y1) = self.rect.corners();
        let tol = self.rect.band();
        let on_edge = mask_rows(&points, |p| {
            let d = (p[0] - x0).abs().min((p[0] - x1).abs());
            let d = d.min((p[1] - y0).abs()).min((p[1] - y1).abs());
            d <= tol
        });
        Ok(near & on_edge)
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        self.rect.bounding_box()
    }

    /// Evenly spaced in arc length around the perimeter.
    fn sample_grid(&self, n: usize, _rng: &mut dyn RngCore) -> Result<Points> {
        let step = self.perimeter() / n.max(1) as f32;
        self.points_at((0..n).map(|i| i as f32 * step), n)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let perimeter = self.perimeter();
        let arc: Vec<f32> = (0..n).map(|_| perimeter * rng.gen::<f32>()).collect();
        self.points_at(arc.into_iter(), n)
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

impl BoundaryDomain for RectangleBoundary {
    fn normal(&self, points: ArrayView2<'_, f32>) -> Result<Points> {
        check_columns(self.space(), &points)?;
        Ok(Array2::from_shape_fn((points.nrows(), 2), |(i, j)| {
            EDGE_NORMALS[self.nearest_edge(points[[i, 0]], points[[i, 1]])][j]
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

    fn plate() -> Rectangle {
        Rectangle::new(Space::var("x", 2), [1.0, -1.0], 2.0, 1.0).unwrap()
    }

    #[test]
    fn rejects_degenerate_sides() {
        assert!(Rectangle::new(Space::var("x", 2), [0.0, 0.0], 0.0, 1.0).is_err());
        assert!(Rectangle::new(Space::var("x", 2), [0.0, 0.0], 1.0, -1.0).is_err());
        assert!(Rectangle::new(Space::var("x", 3), [0.0, 0.0], 1.0, 1.0).is_err());
    }

    #[test]
    fn bounding_box_and_containment() {
        let rect = plate();
        assert_eq!(rect.bounding_box().unwrap(), vec![1.0, 3.0, -1.0, 0.0]);
        let inside = rect
            .is_inside(array![[2.0f32, -0.5], [3.0, 0.0], [0.9, -0.5], [2.0, 0.1]].view())
            .unwrap();
        assert_eq!(inside.column(0).to_vec(), vec![true, true, false, false]);
    }

    #[test]
    fn grid_is_exact_and_inside() {
        let rect = plate();
        let mut rng = seeded_rng(0);
        for n in [1, 7, 50, 51] {
            let grid = rect.sample_grid(n, &mut rng).unwrap();
            assert_eq!(grid.nrows(), n);
            assert!(rect.is_inside(grid.view()).unwrap().iter().all(|&b| b));
        }
    }

    #[test]
    fn boundary_walks_the_perimeter() {
        let edges = plate().boundary().unwrap();
        let mut rng = seeded_rng(1);
        assert_eq!(edges.dim(), 1);
        let grid = edges.sample_grid(6, &mut rng).unwrap();
        // perimeter 6, unit steps from the origin corner
        assert_eq!(grid.row(0).to_vec(), vec![1.0, -1.0]);
        assert_eq!(grid.row(2).to_vec(), vec![3.0, -1.0]);
        assert_eq!(grid.row(3).to_vec(), vec![3.0, 0.0]);
        assert_eq!(grid.row(5).to_vec(), vec![1.0, 0.0]);
        assert!(edges.is_inside(grid.view()).unwrap().iter().all(|&b| b));
        assert!(!edges.is_inside_point(&[2.0, -0.5]).unwrap()[[0, 0]]);
    }

    #[test]
    fn normals_point_outward() {
        let edges = plate().boundary().unwrap();
        let normals = edges
            .normal(array![[2.0f32, -1.0], [3.0, -0.5], [2.0, 0.0], [1.0, -0.5]].view())
            .unwrap();
        assert_eq!(
            normals,
            array![[0.0f32, -1.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]
        );
    }

    #[test]
    fn perimeter_far_from_the_origin_keeps_its_samples() {
        let rect = Rectangle::new(Space::var("x", 2), [500.3, -800.7], 3.1, 2.2).unwrap();
        let edges = rect.boundary().unwrap();
        let mut rng = seeded_rng(2);
        let random = edges.sample_random_uniform(300, &mut rng).unwrap();
        let grid = edges.sample_grid(300, &mut rng).unwrap();
        assert!(edges.is_inside(random.view()).unwrap().iter().all(|&b| b));
        assert!(edges.is_inside(grid.view()).unwrap().iter().all(|&b| b));
        assert!(!edges.is_inside_point(&[501.85, -799.6]).unwrap()[[0, 0]]);
        assert!((rect.volume(&mut rng).unwrap() - 3.1 * 2.2).abs() < 1e-5);
    }
}
