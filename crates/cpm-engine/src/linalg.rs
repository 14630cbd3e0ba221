//! Symmetric positive-definite solves for the ridge state.
//!
//! The design matrix is never inverted explicitly. Every read of `A⁻¹` goes
//! through a Cholesky factor `A = LLᵀ` computed fresh for the call. The model
//! state stays in `ndarray`; it is copied into `nalgebra` only for the
//! factorization.

use knexa_core::{KnexaError, KnexaResult};
use nalgebra::{DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1};

/// Cholesky factor of a symmetric positive-definite matrix.
pub struct Cholesky {
    chol: nalgebra::Cholesky<f64, Dyn>,
}

impl Cholesky {
    /// Factor `a`. Fails with `SingularMatrix` when `a` is not positive
    /// definite.
    pub fn factor(a: &Array2<f64>) -> KnexaResult<Self> {
        let (rows, cols) = a.dim();
        if rows != cols {
            return Err(KnexaError::DimensionMismatch {
                expected: rows,
                actual: cols,
            });
        }
        if a.iter().any(|v| !v.is_finite()) {
            return Err(KnexaError::SingularMatrix(
                "design matrix contains NaN or infinity".to_string(),
            ));
        }

        let m = DMatrix::from_fn(rows, cols, |r, c| a[[r, c]]);
        let chol = nalgebra::Cholesky::new(m).ok_or_else(|| {
            KnexaError::SingularMatrix(format!("{rows}x{cols} matrix is not positive definite"))
        })?;
        Ok(Self { chol })
    }

    pub fn dim(&self) -> usize {
        self.chol.l_dirty().nrows()
    }

    fn to_dvector(x: ArrayView1<f64>) -> DVector<f64> {
        DVector::from_iterator(x.len(), x.iter().copied())
    }

    /// `A⁻¹b`.
    pub fn solve(&self, b: ArrayView1<f64>) -> Array1<f64> {
        let x = self.chol.solve(&Self::to_dvector(b));
        x.iter().copied().collect()
    }

    /// `xᵀA⁻¹x`, computed as `‖L⁻¹x‖²` so the result is never negative.
    pub fn inv_quad_form(&self, x: ArrayView1<f64>) -> f64 {
        let x = Self::to_dvector(x);
        match self.chol.l_dirty().solve_lower_triangular(&x) {
            Some(y) => y.norm_squared(),
            None => x.dot(&self.chol.solve(&x)).max(0.0),
        }
    }

    /// `ln det A = 2 Σ ln L_ii`.
    pub fn log_det(&self) -> f64 {
        2.0 * self.chol.l_dirty().diagonal().iter().map(|v| v.ln()).sum::<f64>()
    }
}
