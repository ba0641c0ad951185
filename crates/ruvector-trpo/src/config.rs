//! Optimizer configuration.
//!
//! [`TrpoConfig`] carries every hyper-parameter of a trust-region step: the
//! conjugate-gradient budget, the backtracking schedule, the trust-region size
//! and the Fisher damping. It serializes through [`serde`] so a run's settings
//! can be stored next to its checkpoints.
//!
//! ```rust
//! use ruvector_trpo::TrpoConfig;
//!
//! let cfg = TrpoConfig::default().with_max_kl(0.02);
//! cfg.validate().expect("valid config");
//! assert_eq!(cfg.cg_iterations, 10);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conjugate_gradient::ConjugateGradient;
use crate::error::{Result, TrpoError};
use crate::line_search::BacktrackingLineSearch;

/// Hyper-parameters for one trust-region policy update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrpoConfig {
    /// Maximum conjugate-gradient iterations. Default: **10**.
    pub cg_iterations: usize,

    /// Squared-residual threshold that stops CG early. Default: **1e-8**.
    pub cg_tolerance: f64,

    /// Damping `λ` added to the Fisher-vector product as `λ·v`. Default: **0.1**.
    pub cg_damping: f64,

    /// Number of candidate fractions tried by the line search. Default: **10**.
    pub max_backtracks: usize,

    /// Shrink factor between successive candidates. Default: **0.5**.
    pub backtrack_ratio: f64,

    /// Trust-region size `δ`: the full step satisfies `½·sᵀ(F + λI)s = δ`,
    /// with `λ` = [`cg_damping`](Self::cg_damping). Default: **0.01**.
    pub max_kl: f64,
}

impl Default for TrpoConfig {
    fn default() -> Self {
        Self {
            cg_iterations: 10,
            cg_tolerance: 1e-8,
            cg_damping: 0.1,
            max_backtracks: 10,
            backtrack_ratio: 0.5,
            max_kl: 0.01,
        }
    }
}

impl TrpoConfig {
    /// Set the CG iteration budget
    pub fn with_cg_iterations(mut self, iterations: usize) -> Self {
        self.cg_iterations = iterations;
        self
    }

    /// Set the CG residual tolerance
    pub fn with_cg_tolerance(mut self, tolerance: f64) -> Self {
        self.cg_tolerance = tolerance;
        self
    }

    /// Set the Fisher damping constant
    pub fn with_cg_damping(mut self, damping: f64) -> Self {
        self.cg_damping = damping;
        self
    }

    /// Set the number of backtracking candidates
    pub fn with_max_backtracks(mut self, backtracks: usize) -> Self {
        self.max_backtracks = backtracks;
        self
    }

    /// Set the backtracking shrink factor
    pub fn with_backtrack_ratio(mut self, ratio: f64) -> Self {
        self.backtrack_ratio = ratio;
        self
    }

    /// Set the trust-region size
    pub fn with_max_kl(mut self, max_kl: f64) -> Self {
        self.max_kl = max_kl;
        self
    }

    /// Validate all fields, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.cg_iterations == 0 {
            return Err(TrpoError::invalid_parameter("cg_iterations", "must be > 0"));
        }
        if self.cg_tolerance.is_nan() || self.cg_tolerance <= 0.0 {
            return Err(TrpoError::invalid_parameter("cg_tolerance", "must be > 0.0"));
        }
        if self.cg_damping.is_nan() || self.cg_damping < 0.0 {
            return Err(TrpoError::invalid_parameter("cg_damping", "must be >= 0.0"));
        }
        if self.max_backtracks == 0 {
            return Err(TrpoError::invalid_parameter("max_backtracks", "must be > 0"));
        }
        if self.backtrack_ratio.is_nan()
            || self.backtrack_ratio <= 0.0
            || self.backtrack_ratio >= 1.0
        {
            return Err(TrpoError::invalid_parameter(
                "backtrack_ratio",
                "must be in (0.0, 1.0)",
            ));
        }
        if !self.max_kl.is_finite() || self.max_kl <= 0.0 {
            return Err(TrpoError::invalid_parameter("max_kl", "must be > 0.0"));
        }
        Ok(())
    }

    /// Conjugate-gradient solver configured from this config
    pub fn conjugate_gradient(&self) -> ConjugateGradient {
        ConjugateGradient::new(self.cg_iterations, self.cg_tolerance)
    }

    /// Line search configured from this config
    pub fn line_search(&self) -> BacktrackingLineSearch {
        BacktrackingLineSearch::new(self.max_backtracks).with_ratio(self.backtrack_ratio)
    }

    /// Parse and validate a config from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: TrpoConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| TrpoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Write this config to `path` as JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TrpoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|source| TrpoError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
