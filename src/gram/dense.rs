use nalgebra::{DMatrix, DVector};

use super::{passive_indices, scatter, svd_solve, GramSolve};
use crate::utils::FloatOps;

impl<T: FloatOps> GramSolve<T> for DMatrix<T> {
    fn side(&self) -> usize {
        self.ncols()
    }

    fn mul_vec(&self, x: &DVector<T>) -> DVector<T> {
        self * x
    }

    fn restricted_solve(&self, passive: &[bool], atb: &DVector<T>) -> anyhow::Result<DVector<T>> {
        debug_assert_eq!(passive.len(), self.ncols());
        let indices = passive_indices(passive);
        if indices.is_empty() {
            return Ok(DVector::zeros(self.ncols()));
        }

        let block = DMatrix::from_fn(indices.len(), indices.len(), |r, c| {
            self[(indices[r], indices[c])]
        });
        let rhs = DVector::from_fn(indices.len(), |r, _| atb[indices[r]]);
        let solution = svd_solve(block, &rhs)?;
        Ok(scatter(self.ncols(), &indices, &solution))
    }
}
