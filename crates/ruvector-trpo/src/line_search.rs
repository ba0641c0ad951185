//! Backtracking Line Search
//!
//! Walks shrinking fractions `1, ρ, ρ², …` of a full trust-region step and
//! accepts the first candidate that strictly improves the surrogate objective.
//!
//! Acceptance is the plain one-sided test `f(θ₀ + ρⁱ·s) - f(θ₀) > 0`. There
//! is no Armijo-style comparison against the expected improvement. If no
//! candidate improves, `θ₀` is returned unchanged (a null step), which is a
//! normal outcome rather than an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TrpoError};
use crate::utils::offset;

/// Surrogate objective scored on a flat parameter vector. Higher is better.
///
/// Only the sign of differences between evaluations is used.
pub trait SurrogateObjective {
    /// Evaluate the objective at `theta`
    fn evaluate(&mut self, theta: &[f64]) -> f64;
}

impl<F> SurrogateObjective for F
where
    F: FnMut(&[f64]) -> f64,
{
    fn evaluate(&mut self, theta: &[f64]) -> f64 {
        self(theta)
    }
}

/// Monitoring signal emitted by a search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSearchStatus {
    /// A candidate improved the objective
    Improved {
        /// Backtrack index `i` of the accepted candidate
        backtrack: usize,
        /// Fraction `ρⁱ` of the full step that was taken
        fraction: f64,
        /// `f(θ) - f(θ₀)`, strictly positive
        improvement: f64,
    },
    /// Every candidate was rejected; `θ₀` was returned
    NoImprovement {
        /// Number of candidates evaluated
        attempts: usize,
    },
}

/// Result of a line search
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchOutcome {
    /// Accepted parameters, or a copy of `θ₀`
    pub theta: Vec<f64>,
    /// Objective at `θ₀`
    pub baseline: f64,
    /// What happened
    pub status: LineSearchStatus,
}

impl LineSearchOutcome {
    /// True when a candidate was accepted
    pub fn improved(&self) -> bool {
        matches!(self.status, LineSearchStatus::Improved { .. })
    }

    /// Take the returned parameters
    pub fn into_params(self) -> Vec<f64> {
        self.theta
    }
}

/// Backtracking schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktrackingLineSearch {
    max_backtracks: usize,
    ratio: f64,
}

impl Default for BacktrackingLineSearch {
    fn default() -> Self {
        Self::new(10)
    }
}

impl BacktrackingLineSearch {
    /// Halving schedule with `max_backtracks` candidates
    pub fn new(max_backtracks: usize) -> Self {
        Self {
            max_backtracks,
            ratio: 0.5,
        }
    }

    /// Set the shrink factor `ρ`
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    /// Number of candidates tried
    pub fn max_backtracks(&self) -> usize {
        self.max_backtracks
    }

    /// Shrink factor
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Search along `full_step` from `theta0`
    ///
    /// # Errors
    /// [`TrpoError::LengthMismatch`] if `full_step` and `theta0` differ in length.
    pub fn search<S>(
        &self,
        surrogate: &mut S,
        theta0: &[f64],
        full_step: &[f64],
    ) -> Result<LineSearchOutcome>
    where
        S: SurrogateObjective + ?Sized,
    {
        if full_step.len() != theta0.len() {
            return Err(TrpoError::length_mismatch(theta0.len(), full_step.len()));
        }

        let baseline = surrogate.evaluate(theta0);
        let mut fraction = 1.0;

        for backtrack in 0..self.max_backtracks {
            let candidate = offset(theta0, fraction, full_step);
            let improvement = surrogate.evaluate(&candidate) - baseline;
            debug!(backtrack, fraction, improvement, "line search candidate");

            if improvement > 0.0 {
                info!(backtrack, fraction, improvement, "objective improved");
                return Ok(LineSearchOutcome {
                    theta: candidate,
                    baseline,
                    status: LineSearchStatus::Improved {
                        backtrack,
                        fraction,
                        improvement,
                    },
                });
            }
            fraction *= self.ratio;
        }

        warn!(attempts = self.max_backtracks, "objective not improved");
        Ok(LineSearchOutcome {
            theta: theta0.to_vec(),
            baseline,
            status: LineSearchStatus::NoImprovement {
                attempts: self.max_backtracks,
            },
        })
    }
}

/// Halving line search returning only the parameters
pub fn line_search<S>(
    surrogate: &mut S,
    theta0: &[f64],
    full_step: &[f64],
    max_backtracks: usize,
) -> Result<Vec<f64>>
where
    S: SurrogateObjective + ?Sized,
{
    BacktrackingLineSearch::new(max_backtracks)
        .search(surrogate, theta0, full_step)
        .map(LineSearchOutcome::into_params)
}
