//! Diagonal Gaussian Policy Statistics
//!
//! Closed-form statistics of a policy `π(a|s) = N(μ(s), diag(σ(s)²))`
//! parameterized by `(mean, log_std)` with `σ = exp(log_std)`.
//!
//! All inputs are batched `[batch, action_dim]`. Every function reduces over
//! the action axis only and returns one value per sample; averaging over the
//! batch is left to the caller (see [`mean_kl`], [`mean_entropy`]).
//!
//! ## Formulas (per sample, summed over action dimension i)
//!
//! ```text
//! log π(a)      = Σ -(aᵢ-μᵢ)²/(2σᵢ²) - ½·ln(2π) - log σᵢ
//! KL(p₁ ‖ p₂)   = Σ log σ₂ᵢ - log σ₁ᵢ + (σ₁ᵢ² + (μ₁ᵢ-μ₂ᵢ)²)/(2σ₂ᵢ²) - ½
//! H(π)          = Σ (1 + ln(2π·σᵢ²)) / 2
//! ```
//!
//! No lower bound is placed on `log_std`; near-zero variances are the
//! caller's responsibility.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};

use crate::error::{Result, TrpoError};

/// ln(2π)
pub const LN_2PI: f64 = 1.837_877_066_409_345_3;

fn ensure_same_shape(expected: &[usize], got: &[usize]) -> Result<()> {
    if expected != got {
        return Err(TrpoError::dimension_mismatch(expected, got));
    }
    Ok(())
}

/// Per-sample log-probability of `action` under `N(mean, exp(log_std)²)`
pub fn log_probability(
    mean: ArrayView2<'_, f64>,
    log_std: ArrayView2<'_, f64>,
    action: ArrayView2<'_, f64>,
) -> Result<Array1<f64>> {
    ensure_same_shape(mean.shape(), log_std.shape())?;
    ensure_same_shape(mean.shape(), action.shape())?;

    let per_dim = Zip::from(&mean)
        .and(&log_std)
        .and(&action)
        .map_collect(|&mu, &s, &a| {
            let variance = (2.0 * s).exp();
            -(a - mu).powi(2) / (2.0 * variance) - 0.5 * LN_2PI - s
        });
    Ok(per_dim.sum_axis(Axis(1)))
}

/// Per-sample `KL(N(mean1, σ₁²) ‖ N(mean2, σ₂²))`.
///
/// The first operand is the reference (old) policy. When this feeds a
/// trust-region constraint the reference must be a frozen copy, see
/// [`DiagGaussian::snapshot`] and [`kl_from_reference`].
pub fn kl_divergence(
    mean1: ArrayView2<'_, f64>,
    log_std1: ArrayView2<'_, f64>,
    mean2: ArrayView2<'_, f64>,
    log_std2: ArrayView2<'_, f64>,
) -> Result<Array1<f64>> {
    ensure_same_shape(mean1.shape(), log_std1.shape())?;
    ensure_same_shape(mean1.shape(), mean2.shape())?;
    ensure_same_shape(mean1.shape(), log_std2.shape())?;

    let per_dim = Zip::from(&mean1)
        .and(&log_std1)
        .and(&mean2)
        .and(&log_std2)
        .map_collect(|&mu1, &s1, &mu2, &s2| {
            let var1 = (2.0 * s1).exp();
            let var2 = (2.0 * s2).exp();
            s2 - s1 + (var1 + (mu1 - mu2).powi(2)) / (2.0 * var2) - 0.5
        });
    Ok(per_dim.sum_axis(Axis(1)))
}

/// Per-sample differential entropy. Depends on `log_std` only; `mean` fixes the shape.
pub fn entropy(mean: ArrayView2<'_, f64>, log_std: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    ensure_same_shape(mean.shape(), log_std.shape())?;
    let per_dim =
        log_std.mapv(|s| (1.0 + (2.0 * std::f64::consts::PI * (2.0 * s).exp()).ln()) / 2.0);
    Ok(per_dim.sum_axis(Axis(1)))
}

/// Batch-mean of [`kl_divergence`]
pub fn mean_kl(
    mean1: ArrayView2<'_, f64>,
    log_std1: ArrayView2<'_, f64>,
    mean2: ArrayView2<'_, f64>,
    log_std2: ArrayView2<'_, f64>,
) -> Result<f64> {
    batch_mean(kl_divergence(mean1, log_std1, mean2, log_std2)?)
}

/// Batch-mean of [`entropy`]
pub fn mean_entropy(mean: ArrayView2<'_, f64>, log_std: ArrayView2<'_, f64>) -> Result<f64> {
    batch_mean(entropy(mean, log_std)?)
}

/// Importance weights `exp(log π_new - log π_old)` used by surrogate objectives
pub fn likelihood_ratio(
    logp_new: ArrayView1<'_, f64>,
    logp_old: ArrayView1<'_, f64>,
) -> Result<Array1<f64>> {
    ensure_same_shape(logp_old.shape(), logp_new.shape())?;
    Ok(Zip::from(&logp_new)
        .and(&logp_old)
        .map_collect(|&new, &old| (new - old).exp()))
}

fn batch_mean(per_sample: Array1<f64>) -> Result<f64> {
    per_sample
        .mean()
        .ok_or_else(|| TrpoError::empty_input("batch"))
}

/// Batched diagonal Gaussian policy output
#[derive(Debug, Clone, PartialEq)]
pub struct DiagGaussian {
    mean: Array2<f64>,
    log_std: Array2<f64>,
}

impl DiagGaussian {
    /// Create from `[batch, action_dim]` mean and log-std
    pub fn new(mean: Array2<f64>, log_std: Array2<f64>) -> Result<Self> {
        ensure_same_shape(mean.shape(), log_std.shape())?;
        Ok(Self { mean, log_std })
    }

    /// Batch size
    pub fn batch_size(&self) -> usize {
        self.mean.nrows()
    }

    /// Action dimensionality
    pub fn action_dim(&self) -> usize {
        self.mean.ncols()
    }

    /// Mean
    pub fn mean(&self) -> ArrayView2<'_, f64> {
        self.mean.view()
    }

    /// Log standard deviation
    pub fn log_std(&self) -> ArrayView2<'_, f64> {
        self.log_std.view()
    }

    /// Replace both statistics, e.g. after the policy network is re-evaluated
    pub fn update(&mut self, mean: Array2<f64>, log_std: Array2<f64>) -> Result<()> {
        ensure_same_shape(self.mean.shape(), mean.shape())?;
        ensure_same_shape(self.mean.shape(), log_std.shape())?;
        self.mean = mean;
        self.log_std = log_std;
        Ok(())
    }

    /// Per-sample log-probability of `actions`
    pub fn log_probability(&self, actions: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        log_probability(self.mean.view(), self.log_std.view(), actions)
    }

    /// Per-sample entropy
    pub fn entropy(&self) -> Result<Array1<f64>> {
        entropy(self.mean.view(), self.log_std.view())
    }

    /// Value copy of the current statistics.
    ///
    /// The copy owns its data and exposes no mutation, so later updates to
    /// `self` never reach it. Use it as the fixed reference operand of KL.
    pub fn snapshot(&self) -> FrozenGaussian {
        FrozenGaussian {
            mean: self.mean.clone(),
            log_std: self.log_std.clone(),
        }
    }
}

/// Immutable reference policy taken with [`DiagGaussian::snapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenGaussian {
    mean: Array2<f64>,
    log_std: Array2<f64>,
}

impl FrozenGaussian {
    /// Frozen mean
    pub fn mean(&self) -> ArrayView2<'_, f64> {
        self.mean.view()
    }

    /// Frozen log standard deviation
    pub fn log_std(&self) -> ArrayView2<'_, f64> {
        self.log_std.view()
    }
}

/// Per-sample `KL(reference ‖ current)` with the reference held fixed
pub fn kl_from_reference(
    reference: &FrozenGaussian,
    current: &DiagGaussian,
) -> Result<Array1<f64>> {
    kl_divergence(
        reference.mean(),
        reference.log_std(),
        current.mean(),
        current.log_std(),
    )
}
