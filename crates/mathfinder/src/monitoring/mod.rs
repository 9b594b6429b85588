//! Scheduled drift monitoring of registered models.
//!
//! One pass walks every monitored model, tests the ones that are due against
//! the oldest file waiting in their inbox, and mails the owner the outcome.

mod baseline;
mod due;
mod orchestrator;
mod queue;
mod registry;
mod report;
mod scoring;
mod state;

use core::time::Duration;
use std::path::PathBuf;

use predictor::PredictorError;
use thiserror::Error;

pub use baseline::{BaselineStore, PgBaselineStore};
pub use due::is_due;
pub use orchestrator::{Monitor, PassSummary};
pub use queue::{DataResolution, MismatchKind, SchemaMismatch, TestData, TestQueue};
pub use registry::{ModelHandle, ModelRegistry, PgModelRegistry};
pub use report::{Mailer, Report, SmtpMailer, TestOutcome};
pub use scoring::{ACCEPTABILITY_RATIO, Verdict, score};
pub use state::{PgStateTracker, StateTracker};

/// Errors that stop a single model's monitoring cycle, or the whole pass when
/// they come from enumerating the models.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no registered version of model '{0}'")]
    ModelNotFound(String),

    #[error("no baseline metric recorded for model '{0}'")]
    BaselineNotFound(String),

    #[error("no monitoring record for model '{0}'")]
    RecordNotFound(String),

    #[error("'{0}' cannot be used as a model name")]
    InvalidModelName(String),

    #[error("model '{model}' has an unusable signature: {reason}")]
    InvalidSignature { model: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("artifact store error: {0}")]
    ArtifactStore(#[from] object_store::Error),

    #[error(transparent)]
    Predictor(#[from] PredictorError),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}
