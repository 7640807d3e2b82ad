use std::iter::Sum;

use nalgebra::RealField;
use num_traits::{Float, NumAssign};

/// Scalar bound shared by every solver in this crate.
///
/// Combines the `num_traits` float operations with nalgebra's `RealField`
/// (required by the SVD-based restricted solve) plus the marker bounds the
/// parallel driver needs.
pub trait FloatOps: Float + RealField + NumAssign + Sum + Send + Sync + 'static {}

impl<T> FloatOps for T where T: Float + RealField + NumAssign + Sum + Send + Sync + 'static {}

/// Tolerance derived from machine epsilon as `10^floor(log10(sqrt(eps)))`.
///
/// Evaluates to `1e-8` for `f64` and `1e-4` for `f32`.
pub fn default_tolerance<T: FloatOps>() -> T {
    let sqrt_eps = Float::sqrt(<T as Float>::epsilon());
    let exponent: i32 = num_traits::cast(Float::floor(Float::log10(sqrt_eps))).unwrap_or(-8);
    Float::powi(T::from(10.0).unwrap(), exponent)
}

/// Shared configuration for the single right-hand-side solvers.
#[derive(Debug, Clone, Copy)]
pub struct SolverOptions<T> {
    /// Feasibility/optimality tolerance. `None` uses [`default_tolerance`].
    pub tol: Option<T>,
    /// Iteration budget. `None` uses `30 * k` for a `k`-variable problem.
    pub max_iter: Option<usize>,
}

impl<T> Default for SolverOptions<T> {
    fn default() -> Self {
        Self {
            tol: None,
            max_iter: None,
        }
    }
}

impl<T: FloatOps> SolverOptions<T> {
    pub(crate) fn tolerance(&self) -> T {
        self.tol.unwrap_or_else(default_tolerance)
    }

    pub(crate) fn iteration_budget(&self, k: usize) -> usize {
        self.max_iter.unwrap_or(30 * k)
    }
}
