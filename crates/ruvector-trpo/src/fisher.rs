//! Fisher-Vector Product Operators
//!
//! The Fisher information matrix of a policy is never materialized. Solvers
//! only see its action on a vector, `v ↦ F·v`, through [`FisherVectorProduct`].
//!
//! State the product depends on (current policy, damping constant, batch of
//! observations) is owned by the implementing type rather than captured by a
//! closure, so its lifetime is explicit at the call site.
//!
//! Operators are assumed symmetric positive semi-definite; the conjugate
//! gradient solver only converges under that assumption.

use ndarray::{Array2, ArrayView1};

use crate::error::{Result, TrpoError};

/// A linear operator given only through its matrix-vector product
pub trait FisherVectorProduct {
    /// Compute `F·v`. The result must have the same length as `v`.
    fn apply(&self, v: &[f64]) -> Vec<f64>;
}

impl<T: FisherVectorProduct + ?Sized> FisherVectorProduct for &T {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        (**self).apply(v)
    }
}

impl<T: FisherVectorProduct + ?Sized> FisherVectorProduct for Box<T> {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        (**self).apply(v)
    }
}

/// Explicit square matrix, for small problems and tests
#[derive(Debug, Clone, PartialEq)]
pub struct DenseOperator {
    matrix: Array2<f64>,
}

impl DenseOperator {
    /// Wrap a square matrix
    pub fn new(matrix: Array2<f64>) -> Result<Self> {
        if matrix.nrows() != matrix.ncols() {
            return Err(TrpoError::dimension_mismatch(
                &[matrix.nrows(), matrix.nrows()],
                matrix.shape(),
            ));
        }
        Ok(Self { matrix })
    }

    /// Build from row vectors
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        let mut matrix = Array2::zeros((n, n));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(TrpoError::dimension_mismatch(&[n, n], &[n, row.len()]));
            }
            for (j, &v) in row.iter().enumerate() {
                matrix[[i, j]] = v;
            }
        }
        Ok(Self { matrix })
    }

    /// Operator dimension
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Underlying matrix
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }
}

impl FisherVectorProduct for DenseOperator {
    /// Returns an empty vector if `v.len()` differs from [`DenseOperator::dim`],
    /// which callers checking output length report as a length mismatch.
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        if v.len() != self.dim() {
            return Vec::new();
        }
        self.matrix.dot(&ArrayView1::from(v)).to_vec()
    }
}

/// Diagonal operator `diag(d)·v`
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalOperator {
    diagonal: Vec<f64>,
}

impl DiagonalOperator {
    /// Wrap a diagonal
    pub fn new(diagonal: Vec<f64>) -> Self {
        Self { diagonal }
    }
}

impl FisherVectorProduct for DiagonalOperator {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        self.diagonal.iter().zip(v).map(|(&d, &x)| d * x).collect()
    }
}

/// Adds Tikhonov damping: `(F + λI)·v`
#[derive(Debug, Clone)]
pub struct Damped<O> {
    inner: O,
    damping: f64,
}

impl<O: FisherVectorProduct> Damped<O> {
    /// Wrap `inner` with damping `λ` (clamped to be non-negative)
    pub fn new(inner: O, damping: f64) -> Self {
        Self {
            inner,
            damping: damping.max(0.0),
        }
    }

    /// Damping constant
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Unwrap the inner operator
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<O: FisherVectorProduct> FisherVectorProduct for Damped<O> {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let mut out = self.inner.apply(v);
        for (o, &x) in out.iter_mut().zip(v) {
            *o += self.damping * x;
        }
        out
    }
}

/// Adapter for an operator available only as a function value
pub struct FnOperator<F>(pub F);

impl<F> FisherVectorProduct for FnOperator<F>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        (self.0)(v)
    }
}

impl<F> std::fmt::Debug for FnOperator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOperator").finish_non_exhaustive()
    }
}
