use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

use super::{passive_indices, scatter, svd_solve, GramSolve};
use crate::utils::FloatOps;

impl<T: FloatOps> GramSolve<T> for CscMatrix<T> {
    fn side(&self) -> usize {
        self.ncols()
    }

    fn mul_vec(&self, x: &DVector<T>) -> DVector<T> {
        let mut y = DVector::zeros(self.nrows());
        for (i, j, v) in self.triplet_iter() {
            y[i] += *v * x[j];
        }
        y
    }

    fn restricted_solve(&self, passive: &[bool], atb: &DVector<T>) -> anyhow::Result<DVector<T>> {
        debug_assert_eq!(passive.len(), self.ncols());
        let k = self.ncols();
        let indices = passive_indices(passive);
        if indices.is_empty() {
            return Ok(DVector::zeros(k));
        }

        // position of each retained coordinate within the restricted block
        let mut position = vec![usize::MAX; k];
        for (pos, &i) in indices.iter().enumerate() {
            position[i] = pos;
        }

        let mut coo = CooMatrix::new(indices.len(), indices.len());
        for (block_col, &j) in indices.iter().enumerate() {
            let col = self.col(j);
            for (&i, &v) in col.row_indices().iter().zip(col.values()) {
                if passive[i] {
                    coo.push(position[i], block_col, v);
                }
            }
        }
        let block = CscMatrix::from(&coo);
        let rhs = DMatrix::from_fn(indices.len(), 1, |r, _| atb[indices[r]]);

        let solution = match CscCholesky::factor(&block) {
            Ok(cholesky) => cholesky.solve(&rhs).column(0).into_owned(),
            // a rank-deficient passive block is a transient state of the
            // active-set search, not a caller error
            Err(_) => svd_solve(DMatrix::from(&block), &rhs.column(0).into_owned())?,
        };
        Ok(scatter(k, &indices, &solution))
    }
}
