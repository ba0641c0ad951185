//! Trust-Region Policy Update
//!
//! Composes the pieces of a single TRPO step:
//!
//! ```text
//! params ──flatten──► θ₀
//! gradient g ──CG(F + λI)──► d ≈ (F + λI)⁻¹g
//! shs = ½·dᵀ(F + λI)d,  β = √(shs / δ),  s = d / β      (½·sᵀ(F + λI)s = δ)
//! line search θ₀ + ρⁱ·s ──► θ
//! θ ──restore──► params
//! ```
//!
//! Run state (iteration counter, cached parameter layout) lives in
//! [`TrustRegionOptimizer`], never in globals.

use tracing::{info, warn};

use crate::config::TrpoConfig;
use crate::conjugate_gradient::CgTermination;
use crate::error::{Result, TrpoError};
use crate::fisher::{Damped, FisherVectorProduct};
use crate::flat_params::{ParamLayout, ParameterSet};
use crate::line_search::{LineSearchStatus, SurrogateObjective};
use crate::utils::{dot, norm, scaled};

/// Source of flat policy gradients in layout order
pub trait GradientOracle {
    /// Gradient of the surrogate objective at the current `params`
    fn gradient(&mut self, params: &ParameterSet) -> Result<Vec<f64>>;
}

/// Summary of one optimizer step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Step counter after this step (1-based)
    pub iteration: usize,
    /// Parameters after the step
    pub theta: Vec<f64>,
    /// CG iterations used for the search direction
    pub cg_iterations: usize,
    /// How CG terminated
    pub cg_termination: CgTermination,
    /// `½·dᵀ(F + λI)d` for the CG direction `d`, with damping `λ`
    pub shs: f64,
    /// Scale `√(shs / δ)` dividing `d` into the full step
    pub lagrange_multiplier: f64,
    /// First-order predicted improvement `g·s` of the full step
    pub expected_improvement: f64,
    /// Euclidean length of the step actually taken
    pub step_norm: f64,
    /// Line-search signal, `None` when the direction was unusable and no search ran
    pub line_search: Option<LineSearchStatus>,
}

impl StepReport {
    /// True when the parameters moved
    pub fn accepted(&self) -> bool {
        matches!(self.line_search, Some(LineSearchStatus::Improved { .. }))
    }
}

/// Trust-region optimizer context
#[derive(Debug, Clone)]
pub struct TrustRegionOptimizer {
    config: TrpoConfig,
    iteration: usize,
    layout: Option<ParamLayout>,
}

impl TrustRegionOptimizer {
    /// Create an optimizer after validating `config`
    pub fn new(config: TrpoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            iteration: 0,
            layout: None,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &TrpoConfig {
        &self.config
    }

    /// Number of steps taken
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Cached layout, if a parameter set has been seen
    pub fn layout(&self) -> Option<&ParamLayout> {
        self.layout.as_ref()
    }

    /// Forget the cached layout and step counter
    pub fn reset(&mut self) {
        self.iteration = 0;
        self.layout = None;
    }

    fn layout_for(&mut self, params: &ParameterSet) -> Result<&ParamLayout> {
        if self.layout.is_none() {
            self.layout = Some(ParamLayout::of(params)?);
        }
        self.layout
            .as_ref()
            .ok_or_else(|| TrpoError::empty_input("parameter layout"))
    }

    /// Compute a step on flat vectors without touching any parameter set
    ///
    /// # Arguments
    /// * `theta0` - Current flat parameters
    /// * `gradient` - Policy gradient at `theta0`, same length
    /// * `fvp` - Undamped Fisher-vector product at `theta0`
    /// * `surrogate` - Objective scored on candidate parameters
    pub fn compute_step<F, S>(
        &mut self,
        theta0: &[f64],
        gradient: &[f64],
        fvp: &F,
        surrogate: &mut S,
    ) -> Result<StepReport>
    where
        F: FisherVectorProduct + ?Sized,
        S: SurrogateObjective + ?Sized,
    {
        if gradient.len() != theta0.len() {
            return Err(TrpoError::length_mismatch(theta0.len(), gradient.len()));
        }

        let damped = Damped::new(fvp, self.config.cg_damping);
        let cg = self.config.conjugate_gradient().solve(&damped, gradient)?;

        let fd = damped.apply(&cg.x);
        if fd.len() != cg.x.len() {
            return Err(TrpoError::length_mismatch(cg.x.len(), fd.len()));
        }
        let shs = 0.5 * dot(&cg.x, &fd);
        self.iteration += 1;

        if !shs.is_finite() || shs <= 0.0 {
            warn!(
                iteration = self.iteration,
                shs, "unusable search direction, taking a null step"
            );
            return Ok(StepReport {
                iteration: self.iteration,
                theta: theta0.to_vec(),
                cg_iterations: cg.iterations,
                cg_termination: cg.termination,
                shs,
                lagrange_multiplier: 0.0,
                expected_improvement: 0.0,
                step_norm: 0.0,
                line_search: None,
            });
        }

        let lagrange_multiplier = (shs / self.config.max_kl).sqrt();
        let full_step = scaled(&cg.x, 1.0 / lagrange_multiplier);
        let expected_improvement = dot(gradient, &full_step);

        let outcome = self
            .config
            .line_search()
            .search(surrogate, theta0, &full_step)?;

        let delta: Vec<f64> = outcome
            .theta
            .iter()
            .zip(theta0)
            .map(|(&t, &t0)| t - t0)
            .collect();
        let step_norm = norm(&delta);

        info!(
            iteration = self.iteration,
            cg_iterations = cg.iterations,
            shs,
            lagrange_multiplier,
            expected_improvement,
            step_norm,
            accepted = outcome.improved(),
            "trust-region step"
        );

        Ok(StepReport {
            iteration: self.iteration,
            theta: outcome.theta,
            cg_iterations: cg.iterations,
            cg_termination: cg.termination,
            shs,
            lagrange_multiplier,
            expected_improvement,
            step_norm,
            line_search: Some(outcome.status),
        })
    }

    /// Take one step on `params` in place.
    ///
    /// The surrogate is scored on flat vectors in the layout of `params`. On
    /// any error `params` keeps its previous values.
    pub fn step<F, S>(
        &mut self,
        params: &mut ParameterSet,
        gradient: &[f64],
        fvp: &F,
        surrogate: &mut S,
    ) -> Result<StepReport>
    where
        F: FisherVectorProduct + ?Sized,
        S: SurrogateObjective + ?Sized,
    {
        let layout = self.layout_for(params)?.clone();
        let theta0 = layout.flatten(params)?;
        if gradient.len() != layout.total_len() {
            return Err(TrpoError::length_mismatch(layout.total_len(), gradient.len()));
        }

        let report = self.compute_step(&theta0, gradient, fvp, surrogate)?;
        layout.restore(params, &report.theta)?;
        Ok(report)
    }

    /// Like [`TrustRegionOptimizer::step`], pulling the gradient from `oracle`
    pub fn step_with_oracle<G, F, S>(
        &mut self,
        params: &mut ParameterSet,
        oracle: &mut G,
        fvp: &F,
        surrogate: &mut S,
    ) -> Result<StepReport>
    where
        G: GradientOracle + ?Sized,
        F: FisherVectorProduct + ?Sized,
        S: SurrogateObjective + ?Sized,
    {
        let gradient = oracle.gradient(params)?;
        self.step(params, &gradient, fvp, surrogate)
    }
}
