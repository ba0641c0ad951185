//! Conjugate Gradient
//!
//! Approximately solves `A·x = b` where `A` is available only through a
//! [`FisherVectorProduct`]. In a trust-region update `A` is the (damped)
//! Fisher matrix and `b` the policy gradient, so `x ≈ F⁻¹g` is the natural
//! gradient direction.
//!
//! ## Algorithm
//!
//! Starting from `x₀ = 0` (hence `r₀ = p₀ = b`):
//!
//! ```text
//! α  = rᵀr / pᵀAp
//! x ← x + α·p
//! r ← r - α·Ap
//! β  = r'ᵀr' / rᵀr
//! p ← r' + β·p
//! ```
//!
//! stopping once the updated `rᵀr < tolerance` or after `max_iterations`
//! products. The tolerance is only tested after an update, so a small but
//! non-zero `b` still gets a full solve. An exactly zero `b` returns `x = 0`.
//!
//! A search direction with `pᵀAp <= 0` means the operator is not positive
//! definite along `p`. Instead of dividing by it the solver stops and returns
//! the iterate reached so far, tagged [`CgTermination::DegenerateCurvature`].

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Result, TrpoError};
use crate::fisher::FisherVectorProduct;
use crate::utils::{all_finite, axpy, dot};

/// Why the solver stopped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CgTermination {
    /// Squared residual fell below the tolerance
    Converged,
    /// Iteration budget exhausted
    MaxIterations,
    /// `pᵀAp` was non-positive or not finite
    DegenerateCurvature {
        /// Iteration at which it was detected
        iteration: usize,
        /// The offending value of `pᵀAp`
        curvature: f64,
    },
}

/// Solver output
#[derive(Debug, Clone, PartialEq)]
pub struct CgSolution {
    /// Best solution estimate
    pub x: Vec<f64>,
    /// Number of completed iterations (operator products that updated `x`)
    pub iterations: usize,
    /// Final squared residual norm `rᵀr`
    pub residual_sq: f64,
    /// Termination reason
    pub termination: CgTermination,
}

impl CgSolution {
    /// True when the residual tolerance was reached
    pub fn converged(&self) -> bool {
        self.termination == CgTermination::Converged
    }

    /// Turn a degenerate-curvature exit into [`TrpoError::DegenerateCurvature`]
    /// for callers that treat it as fatal.
    pub fn check_curvature(self) -> Result<Self> {
        match self.termination {
            CgTermination::DegenerateCurvature {
                iteration,
                curvature,
            } => Err(TrpoError::degenerate_curvature(iteration, curvature)),
            _ => Ok(self),
        }
    }

    /// Take the solution vector
    pub fn into_vec(self) -> Vec<f64> {
        self.x
    }
}

/// Conjugate-gradient solver settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConjugateGradient {
    max_iterations: usize,
    tolerance: f64,
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tolerance: 1e-8,
        }
    }
}

impl ConjugateGradient {
    /// Create a solver
    ///
    /// # Arguments
    /// * `max_iterations` - Upper bound on operator products (10 typical)
    /// * `tolerance` - Threshold on the squared residual norm
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    /// Iteration budget
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Squared-residual tolerance
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Solve `op·x = b`
    ///
    /// # Errors
    /// * [`TrpoError::InvalidParameter`] if `b` has non-finite entries
    /// * [`TrpoError::LengthMismatch`] if the operator returns a vector of the wrong length
    pub fn solve<O>(&self, op: &O, b: &[f64]) -> Result<CgSolution>
    where
        O: FisherVectorProduct + ?Sized,
    {
        if !all_finite(b) {
            return Err(TrpoError::invalid_parameter("b", "must be finite"));
        }

        let n = b.len();
        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let mut p = b.to_vec();
        let mut rr = dot(&r, &r);

        if rr == 0.0 {
            debug!("cg: zero right-hand side");
            return Ok(CgSolution {
                x,
                iterations: 0,
                residual_sq: rr,
                termination: CgTermination::Converged,
            });
        }

        for k in 0..self.max_iterations {
            let ap = op.apply(&p);
            if ap.len() != n {
                return Err(TrpoError::length_mismatch(n, ap.len()));
            }

            let pap = dot(&p, &ap);
            if !pap.is_finite() || pap <= 0.0 {
                warn!(
                    iteration = k,
                    curvature = pap,
                    "cg: degenerate curvature, returning current iterate"
                );
                return Ok(CgSolution {
                    x,
                    iterations: k,
                    residual_sq: rr,
                    termination: CgTermination::DegenerateCurvature {
                        iteration: k,
                        curvature: pap,
                    },
                });
            }

            let alpha = rr / pap;
            axpy(alpha, &p, &mut x);
            axpy(-alpha, &ap, &mut r);

            let new_rr = dot(&r, &r);
            trace!(iteration = k, residual_sq = new_rr, alpha, "cg iteration");

            if new_rr < self.tolerance {
                debug!(iterations = k + 1, residual_sq = new_rr, "cg: converged");
                return Ok(CgSolution {
                    x,
                    iterations: k + 1,
                    residual_sq: new_rr,
                    termination: CgTermination::Converged,
                });
            }

            let beta = new_rr / rr;
            for (pi, &ri) in p.iter_mut().zip(r.iter()) {
                *pi = ri + beta * *pi;
            }
            rr = new_rr;
        }

        debug!(
            iterations = self.max_iterations,
            residual_sq = rr,
            "cg: iteration budget exhausted"
        );
        Ok(CgSolution {
            x,
            iterations: self.max_iterations,
            residual_sq: rr,
            termination: CgTermination::MaxIterations,
        })
    }
}

/// Solve `op·x = b` and return only `x`
pub fn conjugate_gradient<O>(
    op: &O,
    b: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> Result<Vec<f64>>
where
    O: FisherVectorProduct + ?Sized,
{
    ConjugateGradient::new(max_iterations, tolerance)
        .solve(op, b)
        .map(CgSolution::into_vec)
}
