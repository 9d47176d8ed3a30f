//! Domain families whose shape depends on another variable.
//!
//! A [`LambdaDomain`] stores a constructor and one [`Param`] per constructor
//! argument. Each parameter is either a constant or a function of a point of
//! some other variable (typically time). Calling
//! [`instantiate`](LambdaDomain::instantiate) resolves every parameter at that
//! point and builds a concrete domain:
//!
//! ```
//! use pinn::{Circle, Domain, Param, Space};
//!
//! // A disk that grows with t: radius 1 + t.
//! let family = Circle::lambda(
//!     Space::var("x", 2),
//!     [0.0f32, 0.0],
//!     Param::computed(|t| 1.0 + t[0]),
//! );
//! assert!(!family.is_initialized());
//!
//! let disk = family.instantiate(&[0.5]).unwrap();
//! assert!(disk.is_initialized());
//! assert_eq!(disk.bounding_box().unwrap(), vec![-1.5, 1.5, -1.5, 1.5]);
//! ```
//!
//! The family itself cannot be sampled or tested for containment; those calls
//! return [`Error::NotImplemented`].

use std::fmt;
use std::rc::Rc;

use ndarray::{Array2, ArrayView2};
use rand::RngCore;

use crate::domain::{Domain, Points};
use crate::space::Space;
use crate::{Error, Result, DEFAULT_TOL};

/// A resolved constructor argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec<f32>> for ParamValue {
    fn from(value: Vec<f32>) -> Self {
        ParamValue::Vector(value)
    }
}

impl<const N: usize> From<[f32; N]> for ParamValue {
    fn from(value: [f32; N]) -> Self {
        ParamValue::Vector(value.to_vec())
    }
}

type ParamFn = Rc<dyn Fn(&[f32]) -> ParamValue>;

/// A constructor argument: fixed, or computed from the instantiation point.
#[derive(Clone)]
pub enum Param {
    Constant(ParamValue),
    Computed(ParamFn),
}

impl Param {
    pub fn constant(value: impl Into<ParamValue>) -> Self {
        Param::Constant(value.into())
    }

    pub fn computed<F, V>(f: F) -> Self
    where
        F: Fn(&[f32]) -> V + 'static,
        V: Into<ParamValue>,
    {
        Param::Computed(Rc::new(move |point: &[f32]| -> ParamValue { f(point).into() }))
    }

    pub fn resolve(&self, point: &[f32]) -> ParamValue {
        match self {
            Param::Constant(value) => value.clone(),
            Param::Computed(f) => f(point),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Param::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<ParamValue> for Param {
    fn from(value: ParamValue) -> Self {
        Param::Constant(value)
    }
}

impl From<f32> for Param {
    fn from(value: f32) -> Self {
        Param::Constant(value.into())
    }
}

impl From<Vec<f32>> for Param {
    fn from(value: Vec<f32>) -> Self {
        Param::Constant(value.into())
    }
}

impl<const N: usize> From<[f32; N]> for Param {
    fn from(value: [f32; N]) -> Self {
        Param::Constant(value.into())
    }
}

/// Resolved parameters handed to a domain constructor.
#[derive(Debug, Clone, Default)]
pub struct DomainParams {
    values: Vec<(String, ParamValue)>,
}

impl DomainParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn require(&self, name: &str) -> Result<&ParamValue> {
        self.get(name).ok_or_else(|| Error::MissingParameter(name.to_string()))
    }

    /// A scalar parameter. A one-element vector also counts as a scalar.
    pub fn scalar(&self, name: &str) -> Result<f32> {
        match self.require(name)? {
            ParamValue::Scalar(v) => Ok(*v),
            ParamValue::Vector(v) if v.len() == 1 => Ok(v[0]),
            ParamValue::Vector(v) => Err(Error::InvalidParameter(format!(
                "`{name}` should be a scalar, got {} values",
                v.len()
            ))),
        }
    }

    pub fn vector(&self, name: &str) -> Result<&[f32]> {
        match self.require(name)? {
            ParamValue::Vector(v) => Ok(v),
            ParamValue::Scalar(_) => Err(Error::InvalidParameter(format!(
                "`{name}` should be a vector, got a scalar"
            ))),
        }
    }

    /// A vector parameter of exactly `N` entries.
    pub fn array<const N: usize>(&self, name: &str) -> Result<[f32; N]> {
        let v = self.vector(name)?;
        <[f32; N]>::try_from(v).map_err(|_| {
            Error::InvalidParameter(format!("`{name}` should have {N} entries, got {}", v.len()))
        })
    }
}

type Constructor = Rc<dyn Fn(&DomainParams, Space, f32) -> Result<Box<dyn Domain>>>;

/// A family of domains, materialized per point by [`LambdaDomain::instantiate`].
#[derive(Clone)]
pub struct LambdaDomain {
    constructor: Constructor,
    params: Vec<(String, Param)>,
    space: Space,
    dim: usize,
    tol: f32,
}

impl LambdaDomain {
    /// `dim` is the dimension every instance will have.
    pub fn new<F>(space: Space, dim: usize, constructor: F) -> Self
    where
        F: Fn(&DomainParams, Space, f32) -> Result<Box<dyn Domain>> + 'static,
    {
        Self {
            constructor: Rc::new(constructor),
            params: Vec::new(),
            space,
            dim,
            tol: DEFAULT_TOL,
        }
    }

    /// Set a constructor argument, replacing an earlier one of the same name.
    pub fn with_param(mut self, name: &str, param: impl Into<Param>) -> Self {
        let param = param.into();
        match self.params.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = param,
            None => self.params.push((name.to_string(), param)),
        }
        self
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Every parameter evaluated at `point`.
    pub fn resolve(&self, point: &[f32]) -> DomainParams {
        DomainParams {
            values: self
                .params
                .iter()
                .map(|(name, param)| (name.clone(), param.resolve(point)))
                .collect(),
        }
    }

    /// The concrete domain at `point`.
    pub fn instantiate(&self, point: &[f32]) -> Result<Box<dyn Domain>> {
        (self.constructor)(&self.resolve(point), self.space.clone(), self.tol)
    }
}

impl fmt::Debug for LambdaDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaDomain")
            .field("params", &self.params)
            .field("space", &self.space)
            .field("dim", &self.dim)
            .field("tol", &self.tol)
            .finish_non_exhaustive()
    }
}

impl Domain for LambdaDomain {
    fn space(&self) -> &Space {
        &self.space
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn tol(&self) -> f32 {
        self.tol
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn is_inside(&self, _points: ArrayView2<'_, f32>) -> Result<Array2<bool>> {
        Err(Error::NotImplemented("is_inside"))
    }

    fn bounding_box(&self) -> Result<Vec<f32>> {
        Err(Error::NotImplemented("bounding_box"))
    }

    fn sample_grid(&self, _n: usize, _rng: &mut dyn RngCore) -> Result<Points> {
        Err(Error::NotImplemented("sample_grid"))
    }

    fn sample_random_uniform(&self, _n: usize, _rng: &mut dyn RngCore) -> Result<Points> {
        Err(Error::NotImplemented("sample_random_uniform"))
    }

    fn inner(&self) -> Result<Box<dyn Domain>> {
        Err(Error::NotImplemented("inner"))
    }

    fn clone_box(&self) -> Box<dyn Domain> {
        Box::new(self.clone())
    }
}
