//! # Block principal pivoting
//!
//! NNLS solver after Kim & Park (2011). Unlike FNNLS it iterates on the
//! primal `x` and dual `y` jointly and may exchange whole blocks of
//! variables between the active and passive sets per iteration. A
//! patience/best-count pair guards against cycling: once the infeasible set
//! stops shrinking and patience is spent, only the highest infeasible index
//! is exchanged, which bounds the number of remaining iterations.

use anyhow::{anyhow, ensure};
use nalgebra::DVector;

use crate::gram::GramSolve;
use crate::utils::{FloatOps, SolverOptions};

/// Number of non-improving iterations tolerated before the solver falls
/// back to exchanging a single index. Taken verbatim from the reference
/// algorithm, together with the `k + 1` initial best count.
const PATIENCE: usize = 3;

/// Solves `min ‖Ax − b‖` subject to `x ≥ 0` from the cross products `AᵗA`
/// (any [`GramSolve`] implementation) and `Aᵗb`.
///
/// Terminates when no variable violates the sign constraint of its current
/// set, the exact KKT condition for the partition. An iteration cap guards
/// against defects; hitting it returns the current iterate and logs a
/// warning rather than failing.
///
/// # Errors
/// - `Aᵗb` length does not match the Gram matrix.
/// - The backup rule is reached with an empty infeasible set, which
///   indicates a broken invariant or malformed input.
pub fn pivot<T, G>(
    gram: &G,
    atb: &DVector<T>,
    options: &SolverOptions<T>,
) -> anyhow::Result<DVector<T>>
where
    T: FloatOps,
    G: GramSolve<T> + ?Sized,
{
    let k = gram.side();
    ensure!(
        atb.len() == k,
        "Aᵗb has length {} but AᵗA is {k}×{k}",
        atb.len()
    );
    let tol = options.tolerance();
    let max_iter = options.iteration_budget(k);

    let mut x: DVector<T> = DVector::zeros(k);
    let mut y: DVector<T> = -atb.clone();
    let mut passive = vec![false; k];
    let mut patience = PATIENCE;
    let mut best_infeasible = k + 1;
    let mut iterations = 0usize;
    let mut converged = true;

    loop {
        // a variable is infeasible when it violates the sign constraint of
        // its current set: passive with negative value, or active with
        // negative dual
        let mut infeasible: Vec<usize> = (0..k)
            .filter(|&i| {
                if passive[i] {
                    x[i] < -tol
                } else {
                    y[i] < -tol
                }
            })
            .collect();
        if infeasible.is_empty() {
            break;
        }
        if iterations >= max_iter {
            converged = false;
            break;
        }
        iterations += 1;

        infeasible = cycling_control(infeasible, &mut best_infeasible, &mut patience)?;

        // symmetric difference with the passive set
        for &i in &infeasible {
            passive[i] = !passive[i];
        }

        x = gram.restricted_solve(&passive, atb)?;
        let ax = gram.mul_vec(&x);
        for i in 0..k {
            y[i] = if passive[i] { T::zero() } else { ax[i] - atb[i] };
        }
    }

    if !converged {
        log::warn!(
            "pivot stopped after {iterations} iterations without clearing the infeasible set"
        );
    }
    for i in 0..k {
        if !passive[i] {
            x[i] = T::zero();
        }
    }
    Ok(x)
}

/// Three-tier cycling control over the exchange set.
///
/// An improved (smaller) infeasible count is accepted and refills the
/// patience counter; a non-improving count spends one unit of patience;
/// once patience is spent only the highest infeasible index is exchanged,
/// which makes the infeasible count shrink monotonically and bounds the
/// remaining iterations.
fn cycling_control(
    infeasible: Vec<usize>,
    best_infeasible: &mut usize,
    patience: &mut usize,
) -> anyhow::Result<Vec<usize>> {
    if infeasible.len() < *best_infeasible {
        *best_infeasible = infeasible.len();
        *patience = PATIENCE;
        Ok(infeasible)
    } else if *patience > 0 {
        *patience -= 1;
        Ok(infeasible)
    } else {
        // backup rule
        let last = *infeasible
            .last()
            .ok_or_else(|| anyhow!("backup rule applied to an empty infeasible set"))?;
        Ok(vec![last])
    }
}
