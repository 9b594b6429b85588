use core::fmt;

use dataset::Table;
use predictor::{Predictor, PredictorError, mean_absolute_error};

/// A test passes while its error stays below this multiple of the baseline.
pub const ACCEPTABILITY_RATIO: f64 = 1.05;

/// Runs `predictor` on `features` and returns the mean absolute error against
/// `targets`.
///
/// # Errors
///
/// Returns an error if the inputs and targets differ in row count, prediction
/// fails, or the predictions do not line up with the targets.
pub fn score(
    predictor: &dyn Predictor,
    features: &Table,
    targets: &Table,
) -> Result<f64, PredictorError> {
    if features.n_rows() != targets.n_rows() {
        return Err(PredictorError::ShapeMismatch(format!(
            "{} feature rows vs {} target rows",
            features.n_rows(),
            targets.n_rows()
        )));
    }

    let predictions = predictor.predict(features)?;
    mean_absolute_error(targets, &predictions)
}

/// Outcome of comparing a fresh metric with the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    #[must_use]
    pub fn from_metrics(mae: f64, baseline: f64) -> Self {
        if mae < ACCEPTABILITY_RATIO * baseline {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
        }
    }
}
