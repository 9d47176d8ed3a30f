//! Cartesian products of domains.
//!
//! Points of `a × b` are the columns of `a`'s space followed by the columns
//! of `b`'s space. A space-time cylinder is the usual example:
//!
//! ```
//! use pinn::{seeded_rng, Circle, Domain, Interval, ProductDomain, Space};
//!
//! let disk = Circle::new(Space::var("x", 2), [0.0, 0.0], 1.0).unwrap();
//! let time = Interval::new(Space::var("t", 1), 0.0, 2.0).unwrap();
//! let cylinder = ProductDomain::new(Box::new(disk), Box::new(time)).unwrap();
//! assert_eq!(cylinder.dim(), 3);
//! assert_eq!(cylinder.space().names().collect::<Vec<_>>(), ["x", "t"]);
//!
//! let points = cylinder.sample_grid(100, &mut seeded_rng(0)).unwrap();
//! assert_eq!(points.dim(), (100, 3));
//! ```

use ndarray::{s, Array2, ArrayView2, Axis};
use rand::{Rng, RngCore};

use crate::domain::{check_columns, cut_points, vstack, BoundaryDomain, Domain, Points};
use crate::space::Space;
use crate::{Error, Result};

/// The Cartesian product of two domains.
#[derive(Debug, Clone)]
pub struct ProductDomain {
    a: Box<dyn Domain>,
    b: Box<dyn Domain>,
    space: Space,
}

impl ProductDomain {
    /// Fails if the two spaces share a variable name.
    pub fn new(a: Box<dyn Domain>, b: Box<dyn Domain>) -> Result<Self> {
        let space = a.space().product(b.space())?;
        Ok(Self { a, b, space })
    }

    /// The two factors, in column order.
    pub fn factors(&self) -> (&dyn Domain, &dyn Domain) {
        (self.a.as_ref(), self.b.as_ref())
    }

    /// The columns belonging to each factor.
    fn split<'a>(&self, points: ArrayView2<'a, f32>) -> (ArrayView2<'a, f32>, ArrayView2<'a, f32>) {
        let da = self.a.space().dim();
        let db = self.b.space().dim();
        (points.slice_move(s![.., ..da]), points.slice_move(s![.., da..da + db]))
    }
}

/// Join two point batches of equal length column-wise.
fn hstack(left: &Points, right: &Points) -> Result<Points> {
    Ok(ndarray::concatenate(Axis(1), &[left.view(), right.view()])?)
}

/// Grids of both factors whose sizes multiply to at least `n`, paired in
/// every combination and cut down to `n`.
///
/// The `n` points are shared between the factors by their dimension, so a
/// 2-D disk times a 1-D interval gets about `n^(2/3)` disk points.
fn product_grid<A, B>(a: &A, b: &B, n: usize, rng: &mut dyn RngCore) -> Result<Points>
where
    A: Domain + ?Sized,
    B: Domain + ?Sized,
{
    let width = a.space().dim() + b.space().dim();
    if n == 0 {
        return Ok(Array2::zeros((0, width)));
    }
    let wa = a.dim().max(1) as f64;
    let wb = b.dim().max(1) as f64;
    let n_a = ((n as f64).powf(wa / (wa + wb)).ceil() as usize).clamp(1, n);
    let n_b = n.div_ceil(n_a);
    let grid_a = a.sample_grid(n_a, rng)?;
    let grid_b = b.sample_grid(n_b, rng)?;
    let da = grid_a.ncols();
    let pairs = Array2::from_shape_fn((n_a * n_b, width), |(r, c)| {
        if c < da {
            grid_a[[r / n_b, c]]
        } else {
            grid_b[[r % n_b, c - da]]
        }
    });
    Ok(cut_points(pairs, n, rng))
}

impl Domain for ProductDomain {
    fn space(&self) -> &Space {
        &self.space
    }

    fn dim(&self) -> usize {
        self.a.dim() + self.b.dim()
    }

    fn tol(&self) -> f32 {
        self.a.tol().min(self.b.tol())
    }

    fn is_initialized(&self) -> bool {
        self.a.is_initialized() && self.b.is_initialized()
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(&self.space, &points)?;
        let (pa, pb) = self.split(points);
        Ok(self.a.is_inside(pa)? & self.b.is_inside(pb)?)
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        let mut bbox = self.a.bounding_box()?;
        bbox.extend(self.b.bounding_box()?);
        Ok(bbox)
    }

    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        product_grid(self.a.as_ref(), self.b.as_ref(), n, rng)
    }

    fn volume(&self, rng: &mut dyn RngCore) -> Result<f64> {
        Ok(self.a.volume(rng)? * self.b.volume(rng)?)
    }

    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let pa = self.a.sample_random_uniform(n, rng)?;
        let pb = self.b.sample_random_uniform(n, rng)?;
        hstack(&pa, &pb)
    }

    fn boundary(&self) -> Result<Box<dyn BoundaryDomain>> {
        Ok(Box::new(ProductBoundary::new(self.clone())?))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

/// `(∂a × b) ∪ (a × ∂b)`.
///
/// A factor without a boundary of its own (a boundary, for instance)
/// contributes no part. Normals are the factor normal padded with zeros.
#[derive(Debug, Clone)]
pub struct ProductBoundary {
    product: ProductDomain,
    a_edge: Option<Box<dyn BoundaryDomain>>,
    b_edge: Option<Box<dyn BoundaryDomain>>,
}

impl ProductBoundary {
    /// Fails if neither factor has a boundary.
    pub fn new(product: ProductDomain) -> Result<Self> {
        let a_edge = product.a.boundary().ok();
        let b_edge = product.b.boundary().ok();
        if a_edge.is_none() && b_edge.is_none() {
            return Err(Error::NotImplemented("boundary"));
        }
        Ok(Self {
            product,
            a_edge,
            b_edge,
        })
    }

    /// Rows on `∂a × b`.
    fn on_a_part(&self, pa: ArrayView2<'_, f32>, pb: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        match &self.a_edge {
            Some(edge) => Ok(edge.is_inside(pa)? & self.product.b.is_inside(pb)?),
            None => Ok(Array2::from_elem((pa.nrows(), 1), false)),
        }
    }

    /// Rows on `a × ∂b`.
    fn on_b_part(&self, pa: ArrayView2<'_, f32>, pb: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        match &self.b_edge {
            Some(edge) => Ok(self.product.a.is_inside(pa)? & edge.is_inside(pb)?),
            None => Ok(Array2::from_elem((pa.nrows(), 1), false)),
        }
    }

    /// How many of `n` grid points go to `∂a × b`.
    fn grid_share_of_a(&self, n: usize) -> usize {
        match (&self.a_edge, &self.b_edge) {
            (Some(_), Some(_)) => n.div_ceil(2),
            (Some(_), None) => n,
            (None, _) => 0,
        }
    }

    /// How many of `n` random points go to `∂a × b`.
    fn random_share_of_a(&self, n: usize, rng: &mut dyn RngCore) -> usize {
        match (&self.a_edge, &self.b_edge) {
            (Some(_), Some(_)) => (0..n).filter(|_| rng.gen_bool(0.5)).count(),
            (Some(_), None) => n,
            (None, _) => 0,
        }
    }
}

impl Domain for ProductBoundary {
    fn space(&self) -> &Space {
        &self.product.space
    }

    fn dim(&self) -> usize {
        self.product.dim().saturating_sub(1)
    }

    fn tol(&self) -> f32 {
        self.product.tol()
    }

    fn is_initialized(&self) -> bool {
        self.product.is_initialized()
    }

    fn is_inside(&self, points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        check_columns(self.space(), &points)?;
        let (pa, pb) = self.product.split(points);
        Ok(self.on_a_part(pa, pb)? | self.on_b_part(pa, pb)?)
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        self.product.bounding_box()
    }

    /// Half of the points on each part, each half a product grid.
    fn sample_grid(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let n_a = self.grid_share_of_a(n);
        let mut parts = Vec::with_capacity(2);
        if let Some(edge) = &self.a_edge {
            parts.push(product_grid(edge.as_ref(), self.product.b.as_ref(), n_a, rng)?);
        }
        if let Some(edge) = &self.b_edge {
            parts.push(product_grid(self.product.a.as_ref(), edge.as_ref(), n - n_a, rng)?);
        }
        vstack(&parts, self.space().dim())
    }

    /// Each point lies on either part with equal chance.
    fn sample_random_uniform(&self, n: usize, rng: &mut dyn RngCore) -> Result<Points> {
        let n_a = self.random_share_of_a(n, rng);
        let mut parts = Vec::with_capacity(2);
        if let Some(edge) = &self.a_edge {
            let pa = edge.sample_random_uniform(n_a, rng)?;
            let pb = self.product.b.sample_random_uniform(n_a, rng)?;
            parts.push(hstack(&pa, &pb)?);
        }
        if let Some(edge) = &self.b_edge {
            let pa = self.product.a.sample_random_uniform(n - n_a, rng)?;
            let pb = edge.sample_random_uniform(n - n_a, rng)?;
            parts.push(hstack(&pa, &pb)?);
        }
        vstack(&parts, self.space().dim())
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}

impl BoundaryDomain for ProductBoundary {
    fn normal(&self, points: ArrayView2<'_, f32>) -> Result<Points> {
        check_columns(self.space(), &points)?;
        let (pa, pb) = self.product.split(points);
        let (da, db) = (pa.ncols(), pb.ncols());
        let mut normals = Array2::zeros((points.nrows(), da + db));

        let use_a = match (&self.a_edge, &self.b_edge) {
            (Some(_), Some(_)) => self.on_a_part(pa, pb)?,
            (Some(_), None) => Array2::from_elem((points.nrows(), 1), true),
            (None, _) => Array2::from_elem((points.nrows(), 1), false),
        };
        if let Some(edge) = &self.a_edge {
            let na = edge.normal(pa)?;
            for (i, row) in na.rows().into_iter().enumerate().filter(|(i, _)| use_a[[*i, 0]]) {
                normals.slice_mut(s![i, ..da]).assign(&row);
            }
        }
        if let Some(edge) = &self.b_edge {
            let nb = edge.normal(pb)?;
            for (i, row) in nb.rows().into_iter().enumerate().filter(|(i, _)| !use_a[[*i, 0]]) {
                normals.slice_mut(s![i, da..]).assign(&row);
            }
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
    use crate::{seeded_rng, Circle, Interval, Rectangle};
    use ndarray::array;

    fn cylinder() -> ProductDomain {
        let disk = Circle::new(Space::var("x", 2), [0.0, 0.0], 1.0).unwrap();
        let time = Interval::new(Space::var("t", 1), 0.0, 1.0).unwrap();
        ProductDomain::new(Box::new(disk), Box::new(time)).unwrap()
    }

    #[test]
    fn shared_variable_names_are_rejected() {
        let a = Interval::new(Space::var("t", 1), 0.0, 1.0).unwrap();
        let b = Interval::new(Space::var("t", 1), 0.0, 2.0).unwrap();
        assert!(matches!(
            ProductDomain::new(Box::new(a), Box::new(b)),
            Err(Error::DuplicateVariable(name)) if name == "t"
        ));
    }

    #[test]
    fn containment_checks_both_factors() {
        let c = cylinder();
        let points = array![[0.0f32, 0.0, 0.5], [0.0, 0.0, 1.5], [2.0, 0.0, 0.5]];
        assert_eq!(c.is_inside(points.view()).unwrap().column(0).to_vec(), vec![true, false, false]);
        assert_eq!(c.bounding_box().unwrap(), vec![-1.0, 1.0, -1.0, 1.0, 0.0, 1.0]);
        assert!(c.is_inside(array![[0.0f32, 0.0]].view()).is_err());
    }

    #[test]
    fn grid_shares_points_by_dimension() {
        let c = cylinder();
        let mut rng = seeded_rng(0);
        // 22 disk points × 5 instants, cut to 100
        let grid = c.sample_grid(100, &mut rng).unwrap();
        assert_eq!(grid.nrows(), 100);
        let mut times: Vec<f32> = grid.column(2).to_vec();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(c.is_inside(grid.view()).unwrap().iter().all(|&b| b));
    }

    #[test]
    fn samples_are_exact() {
        let c = cylinder();
        let mut rng = seeded_rng(1);
        for n in [1, 2, 17, 64] {
            assert_eq!(c.sample_grid(n, &mut rng).unwrap().nrows(), n);
            let random = c.sample_random_uniform(n, &mut rng).unwrap();
            assert_eq!(random.dim(), (n, 3));
            assert!(c.is_inside(random.view()).unwrap().iter().all(|&b| b));
        }
    }

    #[test]
    fn boundary_of_a_box_in_space_time() {
        let plate = Rectangle::new(Space::var("x", 2), [0.0, 0.0], 1.0, 1.0).unwrap();
        let time = Interval::new(Space::var("t", 1), 0.0, 1.0).unwrap();
        let slab = ProductDomain::new(Box::new(plate), Box::new(time)).unwrap();
        let edge = slab.boundary().unwrap();
        assert_eq!(edge.dim(), 2);

        let points = array![[0.5f32, 0.5, 0.0], [1.0, 0.5, 0.5], [0.5, 0.5, 0.5]];
        assert_eq!(edge.is_inside(points.view()).unwrap().column(0).to_vec(), vec![true, true, false]);
        let normals = edge.normal(points.slice(s![..2, ..])).unwrap();
        assert_eq!(normals, array![[0.0f32, 0.0, -1.0], [1.0, 0.0, 0.0]]);

        let mut rng = seeded_rng(2);
        for sample in [edge.sample_random_uniform(40, &mut rng).unwrap(), edge.sample_grid(40, &mut rng).unwrap()] {
            assert_eq!(sample.nrows(), 40);
            assert!(edge.is_inside(sample.view()).unwrap().iter().all(|&b| b));
            let normals = edge.normal(sample.view()).unwrap();
            for row in normals.rows() {
                assert!((row.dot(&row) - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn boundary_factor_contributes_one_part() {
        // ∂[0,1] × [0,2]: the two vertical sides only
        let ends = Interval::new(Space::var("x", 1), 0.0, 1.0).unwrap().boundary().unwrap();
        let time = Interval::new(Space::var("t", 1), 0.0, 2.0).unwrap();
        let sides = ProductDomain::new(ends.clone_box(), Box::new(time)).unwrap();
        assert_eq!(sides.dim(), 1);
        let edge = sides.boundary().unwrap();
        assert_eq!(edge.dim(), 0);
        let mut rng = seeded_rng(3);
        let points = edge.sample_random_uniform(10, &mut rng).unwrap();
        assert_eq!(points.nrows(), 10);
        assert!(points.column(1).iter().all(|&t| t == 0.0 || t == 2.0));
    }
}
