//! Multi right-hand-side driver.
//!
//! Computes the cross products `AᵗA` and `AᵗB` once, then fans one
//! single-column solve out per column of `B`, optionally in parallel. The
//! cross products are shared read-only and every worker owns a disjoint
//! output column, so no synchronization beyond the final join is needed.

use anyhow::ensure;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use nshare::{IntoNalgebra, IntoNdarray2};
use rayon::prelude::*;

use crate::fnnls::fnnls;
use crate::gram::GramSolve;
use crate::pivot::pivot;
use crate::utils::{FloatOps, SolverOptions};

/// Single right-hand-side algorithm selected by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Active-set method of Bro & De Jong; grows the passive set one
    /// variable at a time.
    Fnnls,
    /// Block principal pivoting of Kim & Park; exchanges whole blocks per
    /// iteration and usually needs fewer restricted solves.
    #[default]
    Pivot,
}

/// Configured multi-column NNLS solver.
///
/// Build one through [`NnlsSolverBuilder`] and reuse it across problems; a
/// solve keeps no state behind.
pub struct NnlsSolver<T: FloatOps> {
    algorithm: Algorithm,
    options: SolverOptions<T>,
    parallel: bool,
}

impl<T: FloatOps> NnlsSolver<T> {
    /// Solves `min ‖AX − B‖_F` subject to `X ≥ 0` columnwise.
    ///
    /// Computes the cross products once and dispatches one solve per column
    /// of `b`; output column `i` corresponds to input column `i` regardless
    /// of worker scheduling.
    pub fn solve(&self, a: ArrayView2<T>, b: ArrayView2<T>) -> anyhow::Result<Array2<T>> {
        ensure!(
            a.nrows() == b.nrows(),
            "A has {} rows but B has {}",
            a.nrows(),
            b.nrows()
        );
        let a = a.into_nalgebra();
        let b = b.into_nalgebra();
        let ata = a.tr_mul(&a);
        let atb = a.tr_mul(&b);
        Ok(self.solve_gram(&ata, &atb)?.into_ndarray2())
    }

    /// Solves from precomputed cross products `AᵗA` and `AᵗB`, dense or
    /// sparse via the [`GramSolve`] trait.
    pub fn solve_gram<G>(&self, ata: &G, atb: &DMatrix<T>) -> anyhow::Result<DMatrix<T>>
    where
        G: GramSolve<T> + Sync,
    {
        let k = ata.side();
        ensure!(
            atb.nrows() == k,
            "AᵗB has {} rows but AᵗA is {k}×{k}",
            atb.nrows()
        );
        let n = atb.ncols();

        let columns: Vec<DVector<T>> = if self.parallel && n > 1 {
            (0..n)
                .into_par_iter()
                .map(|j| self.solve_gram_column(ata, &atb.column(j).into_owned()))
                .collect::<anyhow::Result<_>>()?
        } else {
            (0..n)
                .map(|j| self.solve_gram_column(ata, &atb.column(j).into_owned()))
                .collect::<anyhow::Result<_>>()?
        };

        let mut out = DMatrix::zeros(k, n);
        for (j, column) in columns.iter().enumerate() {
            out.set_column(j, column);
        }
        Ok(out)
    }

    /// Solves a single right-hand side with the configured algorithm.
    pub fn solve_gram_column<G>(&self, ata: &G, atb: &DVector<T>) -> anyhow::Result<DVector<T>>
    where
        G: GramSolve<T> + ?Sized,
    {
        match self.algorithm {
            Algorithm::Fnnls => fnnls(ata, atb, &self.options),
            Algorithm::Pivot => pivot(ata, atb, &self.options),
        }
    }
}

/// Builder for [`NnlsSolver`].
///
/// Defaults: `Pivot` algorithm, derived tolerance, `30 * k` iteration
/// budget, parallel column dispatch enabled.
pub struct NnlsSolverBuilder<T: FloatOps> {
    algorithm: Algorithm,
    options: SolverOptions<T>,
    parallel: bool,
}

impl<T: FloatOps> Default for NnlsSolverBuilder<T> {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            options: SolverOptions::default(),
            parallel: true,
        }
    }
}

impl<T: FloatOps> NnlsSolverBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn tolerance(mut self, tol: T) -> Self {
        self.options.tol = Some(tol);
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.options.max_iter = Some(max_iter);
        self
    }

    /// Enables or disables parallel dispatch across right-hand-side columns.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn build(self) -> NnlsSolver<T> {
        NnlsSolver {
            algorithm: self.algorithm,
            options: self.options,
            parallel: self.parallel,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{DMatrix, DVector};
    use nalgebra_sparse::{CooMatrix, CscMatrix};
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::{Algorithm, NnlsSolverBuilder};

    fn random_array(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.random_range(-1.0..1.0))
    }

    #[test]
    fn test_known_solution_through_driver() {
        let a = Array2::from_shape_vec(
            (5, 5),
            vec![
                -0.24, -0.82, 1.35, 0.36, 0.35, -0.53, -0.20, -0.76, 0.98, -0.54, 0.22, 1.25,
                -1.60, -1.37, -1.94, -0.51, -0.56, -0.08, 0.96, 0.46, 0.48, -2.25, 0.38, 0.06,
                -1.29,
            ],
        )
        .unwrap();
        let b = Array2::from_shape_vec((5, 1), vec![-1.6, 0.19, 0.17, 0.31, -1.27]).unwrap();
        let expected = [2.201, 1.190, 0.0, 1.550, 0.0];

        for algorithm in [Algorithm::Fnnls, Algorithm::Pivot] {
            let solver = NnlsSolverBuilder::new().algorithm(algorithm).build();
            let x = solver.solve(a.view(), b.view()).unwrap();
            assert_eq!(x.dim(), (5, 1));
            for i in 0..5 {
                assert_abs_diff_eq!(x[[i, 0]], expected[i], epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_columns_stay_in_order() {
        let a = random_array(12, 5, 21);
        let b = random_array(12, 6, 22);
        let solver = NnlsSolverBuilder::new().build();

        let x = solver.solve(a.view(), b.view()).unwrap();
        assert_eq!(x.dim(), (5, 6));
        for j in 0..6 {
            let single = solver
                .solve(a.view(), b.slice(ndarray::s![.., j..j + 1]))
                .unwrap();
            for i in 0..5 {
                assert_abs_diff_eq!(x[[i, j]], single[[i, 0]], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let a = random_array(20, 8, 31);
        let b = random_array(20, 10, 32);
        let parallel = NnlsSolverBuilder::new().parallel(true).build();
        let sequential = NnlsSolverBuilder::new().parallel(false).build();

        let xp = parallel.solve(a.view(), b.view()).unwrap();
        let xs = sequential.solve(a.view(), b.view()).unwrap();
        assert_eq!(xp, xs);
    }

    #[test]
    fn test_gram_input_matches_design_matrix_input() {
        let a = random_array(10, 4, 41);
        let b = random_array(10, 3, 42);
        let solver = NnlsSolverBuilder::new().build();

        let through_a = solver.solve(a.view(), b.view()).unwrap();

        let a_na = DMatrix::from_fn(10, 4, |i, j| a[[i, j]]);
        let b_na = DMatrix::from_fn(10, 3, |i, j| b[[i, j]]);
        let through_gram = solver
            .solve_gram(&a_na.tr_mul(&a_na), &a_na.tr_mul(&b_na))
            .unwrap();

        for i in 0..4 {
            for j in 0..3 {
                assert_abs_diff_eq!(through_a[[i, j]], through_gram[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_sparse_gram_input() {
        let a = DMatrix::from_row_slice(4, 3, &[2.0, 0.0, 1.0, 0.0, 3.0, 0.0, 1.0, 0.0, 2.0, 0.0, 1.0, 0.0]);
        let b = DVector::from_column_slice(&[1.0, 2.0, 3.0, 4.0]);
        let ata = a.tr_mul(&a);
        let atb_mat = DMatrix::from_column_slice(3, 1, a.tr_mul(&b).as_slice());

        let mut coo = CooMatrix::new(3, 3);
        for i in 0..3 {
            for j in 0..3 {
                if ata[(i, j)] != 0.0 {
                    coo.push(i, j, ata[(i, j)]);
                }
            }
        }
        let sparse_ata = CscMatrix::from(&coo);

        let solver = NnlsSolverBuilder::new().build();
        let dense = solver.solve_gram(&ata, &atb_mat).unwrap();
        let sparse = solver.solve_gram(&sparse_ata, &atb_mat).unwrap();
        assert_abs_diff_eq!(dense, sparse, epsilon = 1e-9);
        assert!(dense.iter().all(|v| *v >= -1e-8));
    }

    #[test]
    fn test_row_mismatch_is_an_error() {
        let a = random_array(10, 4, 51);
        let b = random_array(9, 2, 52);
        let solver = NnlsSolverBuilder::<f64>::new().build();
        assert!(solver.solve(a.view(), b.view()).is_err());
    }

    #[test]
    fn test_builder_settings_are_honored() {
        let a = random_array(12, 6, 61);
        let b = random_array(12, 2, 62);
        let strict = NnlsSolverBuilder::new()
            .algorithm(Algorithm::Fnnls)
            .tolerance(1e-10)
            .max_iter(500)
            .parallel(false)
            .build();
        let x = strict.solve(a.view(), b.view()).unwrap();
        assert!(x.iter().all(|v| *v >= -1e-10));
    }
}
