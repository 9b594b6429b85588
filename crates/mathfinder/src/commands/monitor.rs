//! Monitor command - runs one monitoring pass over every registered model.

use anyhow::Result;
use chrono::Local;
use config::{Config, MailConfig};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::monitoring::{
    Monitor, PassSummary, PgBaselineStore, PgModelRegistry, PgStateTracker, SmtpMailer, TestQueue,
};

/// Runs the monitor command.
///
/// With `strict`, any fault, undelivered report or failed state update makes
/// the command fail once the pass is over.
///
/// # Errors
///
/// Returns an error if the pass cannot start, the model list cannot be read,
/// or `strict` is set and the pass had errors.
pub async fn run(pool: &PgPool, config: &Config, strict: bool) -> Result<PassSummary> {
    let mail = MailConfig::from_env()?;

    let monitor = Monitor::new(
        PgModelRegistry::with_local_artifacts(pool.clone(), &config.artifact_dir)?,
        PgBaselineStore::new(pool.clone()),
        PgStateTracker::new(pool.clone()),
        SmtpMailer::new(&mail)?,
        TestQueue::new(&config.inbox_dir),
        config.monitor,
    );

    let today = Local::now().date_naive();
    let summary = monitor.run_pass(today).await?;

    info!(
        models = summary.models,
        passed = summary.passed,
        failed = summary.failed,
        no_data = summary.no_data,
        schema_mismatch = summary.schema_mismatch,
        "Monitoring complete"
    );

    if summary.has_errors() {
        warn!(
            faults = summary.faults,
            delivery_failures = summary.delivery_failures,
            state_update_failures = summary.state_update_failures,
            "Monitoring pass had errors"
        );
        if strict {
            anyhow::bail!(
                "monitoring pass had {} faults, {} undelivered reports and {} failed state updates",
                summary.faults,
                summary.delivery_failures,
                summary.state_update_failures
            );
        }
    }

    Ok(summary)
}
