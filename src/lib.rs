//! # pinn
//!
//! Geometry and calculus for physics-informed learning: sample training points
//! from composable domains, then differentiate a model's output with respect to
//! those points.
//!
//! ## The Problem
//!
//! A physics-informed model is trained on residuals of a differential equation
//! evaluated at points drawn from a region (and its boundary). Two pieces are
//! needed: a way to describe regions and draw points from them, and a way to
//! take exact derivatives of the model output with respect to its inputs,
//! including second derivatives and mixed partials.
//!
//! ## Key Types
//!
//! | Item | Use Case |
//! |------|----------|
//! | [`Domain`] | Containment, bounding box, grid / random sampling |
//! | [`Interval`], [`Rectangle`], [`Circle`] | Concrete shapes |
//! | [`SetDomain`] | Union (`+`), difference (`-`), intersection (`&`) |
//! | [`ProductDomain`] | Cartesian product (`*`), e.g. space × time |
//! | [`BoundaryDomain`] | Boundary points and outward normals |
//! | [`LambdaDomain`] | Shapes whose parameters depend on another variable |
//! | [`autograd`] | Point arrays to `tch` tensors and back, `grad_of_sum` |
//! | [`operators`] | `grad`, `laplacian`, `div`, `jac`, `rot`, `partial`, ... |
//!
//! ## Quick Start
//!
//! ```rust
//! use pinn::{autograd, operators, seeded_rng, Circle, Domain, Space};
//! use tch::Kind;
//!
//! let space = Space::var("x", 2);
//! let disk = Circle::new(space, [0.0, 0.0], 1.0).unwrap();
//! let mut rng = seeded_rng(7);
//!
//! let points = disk.sample_random_uniform(64, &mut rng).unwrap();
//! assert_eq!(points.nrows(), 64);
//!
//! // u(x) = x1² + x2², so Δu = 4 everywhere.
//! let x = autograd::variable(points.view()).unwrap();
//! let u = x.square().sum_dim_intlist([1i64].as_slice(), true, Kind::Float);
//! let lap = operators::laplacian(&u, &[&x], None).unwrap();
//! let lap = autograd::to_points(&lap).unwrap();
//! assert!(lap.iter().all(|&v| (v - 4.0).abs() < 1e-4));
//! ```
//!
//! ## What Can Go Wrong
//!
//! 1. **Space mismatch**: `+`, `-` and `&` need operands over the same space.
//! 2. **Parametrized domains**: a [`LambdaDomain`] must be instantiated at a
//!    point before it can be sampled.
//! 3. **Divergence alignment**: [`operators::div`] pairs output component `k`
//!    with the `k`-th column of the concatenated inputs.
//! 4. **Degenerate derivatives**: differentiating a term that is linear in a
//!    variable twice yields zeros, not an error.

use thiserror::Error;

pub mod autograd;
pub mod circle;
pub mod composite;
pub mod domain;
pub mod interval;
pub mod lambda;
pub mod operators;
pub mod product;
pub mod rectangle;
pub mod sampling;
pub mod space;

pub use autograd::grad_of_sum;
pub use circle::{Circle, CircleBoundary};
pub use composite::{Inner, SetBoundary, SetDomain, SetOp};
pub use domain::{BoundaryDomain, Domain, Points};
pub use interval::{Interval, IntervalBoundary};
pub use lambda::{DomainParams, LambdaDomain, Param, ParamValue};
pub use product::{ProductBoundary, ProductDomain};
pub use rectangle::{Rectangle, RectangleBoundary};
pub use sampling::{seeded_rng, SamplingConfig};
pub use space::{PointBatch, Space, VariablePoints};

/// Domain and operator error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Operands of a set operation have different dimensions.
    #[error("dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A point array is narrower than the space it is split against.
    #[error("points have {found} columns but the space needs {expected}")]
    InsufficientColumns { expected: usize, found: usize },

    /// Tensor or array shapes are incompatible.
    #[error("shape mismatch: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A variable name occurs twice in a space.
    #[error("variable `{0}` appears twice in the space")]
    DuplicateVariable(String),

    /// A variable name is not part of the space.
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// A parametrized domain constructor asked for a parameter that was not given.
    #[error("missing domain parameter `{0}`")]
    MissingParameter(String),

    /// Invalid inputs for the mathematical definition.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The capability is not available on this kind of domain.
    #[error("`{0}` is not implemented for this domain")]
    NotImplemented(&'static str),

    /// Rejection sampling ran out of rounds before collecting enough points.
    #[error("rejection sampling collected {found} of {requested} points")]
    SamplingExhausted { requested: usize, found: usize },

    /// Operands of a set operation live in different spaces.
    #[error("space mismatch: expected {expected}, got {found}")]
    SpaceMismatch { expected: Space, found: Space },

    /// The tensor backend rejected an operation.
    #[error(transparent)]
    Backend(#[from] tch::TchError),

    /// Array construction failed.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for domain and operator calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Default tolerance for boundary membership.
///
/// Points are single precision, so this sits a little above `f32::EPSILON`
/// scaled to unit-sized domains.
pub const DEFAULT_TOL: f32 = 1e-5;
