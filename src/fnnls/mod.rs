//! # Fast Non-Negative Least Squares
//!
//! Active-set solver after Bro & De Jong (1997), operating on the
//! precomputed cross products `AᵗA` and `Aᵗb`. The passive set grows by the
//! most violating coordinate per outer iteration; an inner loop repairs
//! infeasible intermediate solutions with a bounded step before the next
//! gradient update.

use anyhow::ensure;
use nalgebra::DVector;
use num_traits::Float;

use crate::gram::GramSolve;
use crate::utils::{FloatOps, SolverOptions};

/// Solves `min ‖Ax − b‖` subject to `x ≥ 0` from the cross products `AᵗA`
/// (any [`GramSolve`] implementation) and `Aᵗb`.
///
/// Termination is the KKT certificate: every variable is passive, or no
/// active coordinate has a gradient component above the tolerance. When the
/// iteration budget runs out first the current iterate is returned and a
/// warning is logged; callers that need a certificate can check the residual
/// gradient themselves.
///
/// # Errors
/// - `Aᵗb` length does not match the Gram matrix.
/// - The inner minimum-ratio set comes up empty, which indicates a broken
///   invariant (typically a non-PSD cross-product matrix).
pub fn fnnls<T, G>(
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
    let mut passive = vec![false; k];
    let mut w = atb.clone();
    let mut iterations = 0usize;
    let mut converged = true;

    'outer: loop {
        // most KKT-violating active coordinate, if any
        let candidate = (0..k)
            .filter(|&i| !passive[i] && w[i] > tol)
            .max_by(|&a, &b| w[a].partial_cmp(&w[b]).unwrap_or(std::cmp::Ordering::Equal));
        let Some(entering) = candidate else {
            break;
        };
        if iterations >= max_iter {
            converged = false;
            break;
        }

        passive[entering] = true;
        let mut s = gram.restricted_solve(&passive, atb)?;

        while (0..k).any(|i| passive[i] && s[i] <= tol) {
            if iterations >= max_iter {
                converged = false;
                break 'outer;
            }
            iterations += 1;

            // largest feasible step: drives the worst passive coordinate
            // exactly to zero without overshooting the others
            let mut alpha = <T as Float>::infinity();
            let mut ratio_set_nonempty = false;
            for i in 0..k {
                if passive[i] && s[i] <= tol {
                    let step = x[i] / (x[i] - s[i]);
                    if step < alpha {
                        alpha = step;
                    }
                    ratio_set_nonempty = true;
                }
            }
            ensure!(
                ratio_set_nonempty,
                "minimum-ratio set is empty; the cross-product matrix is likely not positive semi-definite"
            );

            for i in 0..k {
                let step = alpha * (s[i] - x[i]);
                x[i] += step;
            }
            for i in 0..k {
                if passive[i] && Float::abs(x[i]) < tol {
                    passive[i] = false;
                }
            }
            s = gram.restricted_solve(&passive, atb)?;
        }

        x.copy_from(&s);
        w = atb - gram.mul_vec(&x);
        iterations += 1;
    }

    if !converged {
        log::warn!(
            "fnnls stopped after {iterations} iterations without meeting the optimality tolerance"
        );
    }
    Ok(x)
}
