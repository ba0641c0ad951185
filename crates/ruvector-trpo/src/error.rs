//! Error types for ruvector-trpo

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for ruvector-trpo operations
pub type Result<T> = std::result::Result<T, TrpoError>;

/// Errors that can occur while flattening parameters or computing a step
#[derive(Error, Debug)]
pub enum TrpoError {
    /// A tensor's declared shape does not account for its stored values
    #[error("Shape error for parameter '{name}': declared {declared:?} ({declared_len} elements), holds {actual} values")]
    Shape {
        /// Parameter name
        name: String,
        /// Declared shape
        declared: Vec<usize>,
        /// Element count implied by the declared shape
        declared_len: usize,
        /// Number of values actually held
        actual: usize,
    },

    /// Flat vector length does not match the parameter set it is paired with
    #[error("Length mismatch: expected {expected} values, got {got}")]
    LengthMismatch {
        /// Expected length
        expected: usize,
        /// Actual length received
        got: usize,
    },

    /// Conjugate gradient met a search direction with non-positive curvature
    #[error("Degenerate curvature at CG iteration {iteration}: p·Ap = {curvature:.3e}")]
    DegenerateCurvature {
        /// Iteration (zero-based) at which the condition was detected
        iteration: usize,
        /// The offending value of p·Ap
        curvature: f64,
    },

    /// Batched inputs whose shapes disagree
    #[error("Dimension mismatch: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape received
        got: Vec<usize>,
    },

    /// Empty input where non-empty was required
    #[error("Empty input: {context}")]
    EmptyInput {
        /// Context describing what was empty
        context: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Config file could not be read or written
    #[error("Cannot access config file `{path}`: {source}")]
    Io {
        /// Path that was being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrpoError {
    /// Create a shape error
    pub fn shape(name: impl Into<String>, declared: &[usize], actual: usize) -> Self {
        Self::Shape {
            name: name.into(),
            declared: declared.to_vec(),
            declared_len: declared.iter().product(),
            actual,
        }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(expected: usize, got: usize) -> Self {
        Self::LengthMismatch { expected, got }
    }

    /// Create a degenerate curvature error
    pub fn degenerate_curvature(iteration: usize, curvature: f64) -> Self {
        Self::DegenerateCurvature {
            iteration,
            curvature,
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::DimensionMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an empty input error
    pub fn empty_input(context: impl Into<String>) -> Self {
        Self::EmptyInput {
            context: context.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TrpoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
