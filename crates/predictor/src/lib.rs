//! Prediction and scoring for symbolic-regression models.
//!
//! A trained model is a closed-form expression per target over the feature
//! variables `x0..x{n-1}`. This crate loads those expressions, evaluates them
//! row by row and scores the result against known targets.

mod metrics;
mod symbolic;

pub use metrics::mean_absolute_error;
pub use symbolic::{SymbolicModel, SymbolicModelArtifact};

use dataset::{DatasetError, Table};
use thiserror::Error;

/// Something that maps a feature table to a target table.
///
/// Implementations are loaded per call and passed around explicitly; nothing
/// caches a shared instance between callers.
pub trait Predictor: Send + Sync {
    /// Predicts one column per target for every row of `features`.
    ///
    /// # Errors
    ///
    /// Returns an error if the features do not fit the model or an
    /// expression cannot be evaluated.
    fn predict(&self, features: &Table) -> Result<Table, PredictorError>;
}

/// Errors raised while loading, running or scoring a model.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("invalid model artifact: {0}")]
    Artifact(#[from] serde_json::Error),

    #[error("model has {actual} equations but {expected} targets")]
    EquationCount { expected: usize, actual: usize },

    #[error("cannot parse equation '{equation}': {source}")]
    Parse {
        equation: String,
        source: evalexpr::EvalexprError,
    },

    #[error("equation '{equation}' uses unknown variable '{variable}'")]
    UnknownVariable { equation: String, variable: String },

    #[error("model expects {expected} feature columns, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("evaluation failed at row {row}: {source}")]
    Evaluation {
        row: usize,
        source: evalexpr::EvalexprError,
    },

    #[error("equation '{equation}' produced a non-finite value at row {row}")]
    NonFinite { row: usize, equation: String },

    #[error("error metric is not a finite number")]
    NonFiniteMetric,

    #[error("predictions and targets differ in shape: {0}")]
    ShapeMismatch(String),

    #[error("cannot score an empty table")]
    NoRows,

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
