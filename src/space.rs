//! Named coordinate spaces and per-variable point batches.
//!
//! A [`Space`] is an ordered list of `(name, dimension)` pairs. Its iteration
//! order is the canonical column order: a flat `(N, dim)` point array is split
//! into contiguous column blocks in that order, and concatenating the blocks
//! back reproduces the array.

use std::fmt;
use std::ops::Index;

use ndarray::{s, Array2, ArrayView2, Axis};

use crate::{Error, Result};

/// Ordered mapping from variable name to its dimensionality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Space {
    variables: Vec<(String, usize)>,
}

impl Space {
    /// Build a space from `(name, dim)` pairs, keeping their order.
    ///
    /// Fails on repeated names or zero-dimensional variables.
    pub fn new<I, S>(variables: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut space = Space::default();
        for (name, dim) in variables {
            let name = name.into();
            if dim == 0 {
                return Err(Error::InvalidParameter(format!(
                    "variable `{name}` must have positive dimension"
                )));
            }
            if space.contains(&name) {
                return Err(Error::DuplicateVariable(name));
            }
            space.variables.push((name, dim));
        }
        Ok(space)
    }

    /// A space with a single variable, e.g. `Space::var("x", 2)` for ℝ².
    ///
    /// Panics if `dim == 0`.
    pub fn var(name: &str, dim: usize) -> Self {
        assert!(dim > 0, "variable dimension must be positive");
        Space {
            variables: vec![(name.to_string(), dim)],
        }
    }

    /// Total dimension: the sum of all variable dimensions.
    pub fn dim(&self) -> usize {
        self.variables.iter().map(|(_, d)| d).sum()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|(n, _)| n == name)
    }

    /// Dimension of `name`, if present.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, d)| d)
    }

    /// Dimension of `name`, or [`Error::UnknownVariable`].
    pub fn dim_of(&self, name: &str) -> Result<usize> {
        self.get(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// `(name, dim)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.variables.iter().map(|(n, d)| (n.as_str(), *d))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.iter().map(|(n, _)| n.as_str())
    }

    /// Concatenate two spaces (the coordinate system of a product domain).
    pub fn product(&self, other: &Space) -> Result<Space> {
        Space::new(self.iter().chain(other.iter()))
    }

    /// Split an `(N, ≥dim)` array into one `(N, v_dim)` block per variable.
    ///
    /// Blocks are contiguous column slices in declaration order. Columns past
    /// `self.dim()` are ignored; fewer columns is an error.
    pub fn split(&self, points: ArrayView2<'_, f32>) -> Result<VariablePoints> {
        if points.ncols() < self.dim() {
            return Err(Error::InsufficientColumns {
                expected: self.dim(),
                found: points.ncols(),
            });
        }
        let mut out = VariablePoints::new();
        let mut start = 0;
        for (name, dim) in self.iter() {
            out.insert(name, points.slice(s![.., start..start + dim]).to_owned());
            start += dim;
        }
        Ok(out)
    }
}

impl Index<&str> for Space {
    type Output = usize;

    /// Panics if `name` is not in the space.
    fn index(&self, name: &str) -> &usize {
        match self.variables.iter().find(|(n, _)| n == name) {
            Some((_, d)) => d,
            None => panic!("unknown variable `{name}`"),
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .variables
            .iter()
            .map(|(n, d)| format!("{n}: R^{d}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Point blocks keyed by variable name, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariablePoints {
    entries: Vec<(String, Array2<f32>)>,
}

impl VariablePoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the block for `name`. Replacing keeps the original position.
    pub fn insert(&mut self, name: &str, points: Array2<f32>) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = points,
            None => self.entries.push((name.to_string(), points)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Array2<f32>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Array2<f32>)> + '_ {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of points (rows of the first block; `0` when empty).
    pub fn n_points(&self) -> usize {
        self.entries.first().map_or(0, |(_, p)| p.nrows())
    }

    /// Concatenate the blocks column-wise, in iteration order.
    pub fn concat(&self) -> Result<Array2<f32>> {
        if self.entries.is_empty() {
            return Ok(Array2::zeros((0, 0)));
        }
        let rows = self.n_points();
        if let Some((_, p)) = self.entries.iter().find(|(_, p)| p.nrows() != rows) {
            return Err(Error::ShapeMismatch {
                expected: vec![rows],
                found: vec![p.nrows()],
            });
        }
        let views: Vec<ArrayView2<'_, f32>> = self.entries.iter().map(|(_, p)| p.view()).collect();
        Ok(ndarray::concatenate(Axis(1), &views)?)
    }
}

impl FromIterator<(String, Array2<f32>)> for VariablePoints {
    fn from_iter<I: IntoIterator<Item = (String, Array2<f32>)>>(iter: I) -> Self {
        let mut out = VariablePoints::new();
        for (name, points) in iter {
            out.insert(&name, points);
        }
        out
    }
}

/// A batch of points, either flat `(N, dim)` or split per variable.
#[derive(Debug, Clone, PartialEq)]
pub enum PointBatch {
    Flat(Array2<f32>),
    Split(VariablePoints),
}

impl PointBatch {
    /// The flat representation. A flat batch passes through unchanged.
    pub fn into_flat(self) -> Result<Array2<f32>> {
        match self {
            PointBatch::Flat(points) => Ok(points),
            PointBatch::Split(vars) => vars.concat(),
        }
    }
}

impl From<Array2<f32>> for PointBatch {
    fn from(points: Array2<f32>) -> Self {
        PointBatch::Flat(points)
    }
}

impl From<VariablePoints> for PointBatch {
    fn from(vars: VariablePoints) -> Self {
        PointBatch::Split(vars)
    }
}
