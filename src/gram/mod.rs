use anyhow::anyhow;
use nalgebra::{DMatrix, DVector};

use crate::utils::{default_tolerance, FloatOps};

mod dense;
mod sparse;

/// Cross-product system consumed by the active-set solvers.
///
/// Both solvers touch the Gram matrix `AᵗA` in exactly two ways: a full
/// matrix-vector product (gradient and dual updates) and an unconstrained
/// least-squares solve restricted to the passive coordinates. Dense and
/// sparse storage provide the same contract, so a solver is written once
/// and dispatched by input type.
pub trait GramSolve<T: FloatOps> {
    /// Number of variables `k`; the Gram matrix is `k × k`.
    fn side(&self) -> usize;

    /// Computes `AᵗA · x`.
    fn mul_vec(&self, x: &DVector<T>) -> DVector<T>;

    /// Solves the unconstrained system over the coordinates flagged in
    /// `passive` and scatters the result into a full-length vector, zero on
    /// the active complement. An empty passive set yields the zero vector.
    fn restricted_solve(&self, passive: &[bool], atb: &DVector<T>) -> anyhow::Result<DVector<T>>;
}

pub(crate) fn passive_indices(passive: &[bool]) -> Vec<usize> {
    passive
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| p.then_some(i))
        .collect()
}

pub(crate) fn scatter<T: FloatOps>(k: usize, indices: &[usize], values: &DVector<T>) -> DVector<T> {
    let mut full = DVector::zeros(k);
    for (pos, &i) in indices.iter().enumerate() {
        full[i] = values[pos];
    }
    full
}

/// Generalized-inverse solve of the restricted block.
///
/// Rank deficiency within a passive block is an expected transient state of
/// the active-set search, so singular values below the default tolerance are
/// truncated instead of raising.
pub(crate) fn svd_solve<T: FloatOps>(
    block: DMatrix<T>,
    rhs: &DVector<T>,
) -> anyhow::Result<DVector<T>> {
    let svd = block.svd(true, true);
    svd.solve(rhs, default_tolerance::<T>())
        .map_err(|e| anyhow!("restricted solve failed: {e}"))
}
