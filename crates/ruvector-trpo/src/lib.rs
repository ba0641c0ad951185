//! # RuVector TRPO
//!
//! Numerical core of a trust-region policy-gradient optimizer: natural-gradient
//! search direction plus a step size that improves a surrogate objective while
//! keeping the policy inside a KL trust region.
//!
//! ## Modules
//!
//! - **Flat parameters**: named tensors ⇄ one contiguous vector
//! - **Gaussian statistics**: log-probability, KL and entropy of diagonal Gaussian policies
//! - **Fisher operators**: matrix-free `v ↦ F·v` interface with damping
//! - **Conjugate gradient**: approximate `F⁻¹g` from vector products only
//! - **Line search**: backtracking acceptance on a surrogate objective
//! - **Optimizer**: the full trust-region step over a parameter set
//!
//! Gradient computation, the Fisher-vector product itself and the surrogate
//! objective are supplied by the caller through [`GradientOracle`],
//! [`FisherVectorProduct`] and [`SurrogateObjective`].
//!
//! ## Data flow
//!
//! ```text
//! GradientOracle ──g──► ConjugateGradient ◄──F·v── FisherVectorProduct
//!                              │
//!                              ▼ d ≈ (F + λI)⁻¹g, scaled to ½·sᵀ(F + λI)s = δ
//!                   BacktrackingLineSearch ◄──f(θ)── SurrogateObjective
//!                              │
//!                              ▼ θ
//!                     ParamLayout::restore ──► ParameterSet
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use ruvector_trpo::{DiagonalOperator, TrpoConfig, TrustRegionOptimizer};
//!
//! let mut optimizer = TrustRegionOptimizer::new(TrpoConfig::default()).unwrap();
//! let fisher = DiagonalOperator::new(vec![2.0, 1.0]);
//! let gradient = vec![1.0, 1.0];
//! let mut surrogate = |theta: &[f64]| theta[0] + theta[1];
//!
//! let report = optimizer
//!     .compute_step(&[0.0, 0.0], &gradient, &fisher, &mut surrogate)
//!     .unwrap();
//! assert!(report.accepted());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
pub mod conjugate_gradient;
pub mod error;
pub mod fisher;
pub mod flat_params;
pub mod gaussian;
pub mod line_search;
pub mod optimizer;
pub mod utils;

pub use config::TrpoConfig;
pub use conjugate_gradient::{conjugate_gradient, CgSolution, CgTermination, ConjugateGradient};
pub use error::{Result, TrpoError};
pub use fisher::{Damped, DenseOperator, DiagonalOperator, FisherVectorProduct, FnOperator};
pub use flat_params::{flatten, restore, LayoutEntry, ParamLayout, Parameter, ParameterSet};
pub use gaussian::{
    entropy, kl_divergence, kl_from_reference, likelihood_ratio, log_probability, mean_entropy,
    mean_kl, DiagGaussian, FrozenGaussian,
};
pub use line_search::{
    line_search, BacktrackingLineSearch, LineSearchOutcome, LineSearchStatus, SurrogateObjective,
};
pub use optimizer::{GradientOracle, StepReport, TrustRegionOptimizer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::conjugate_gradient::*;
    pub use crate::error::*;
    pub use crate::fisher::*;
    pub use crate::flat_params::*;
    pub use crate::gaussian::*;
    pub use crate::line_search::*;
    pub use crate::optimizer::*;
}
