use async_trait::async_trait;
use database::TrainingRunRepository;
use model_structs::MAE_METRIC_KEY;
use sqlx::PgPool;

use super::MonitorError;

/// Source of the reference metric each model is compared against.
#[async_trait]
pub trait BaselineStore: Send + Sync {
    /// Mean absolute error recorded by the model's first training run.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::BaselineNotFound`] if the model has no run or
    /// its first run did not record the metric.
    async fn baseline(&self, model_name: &str) -> Result<f64, MonitorError>;
}

/// Baselines read from the `training_runs` table.
#[derive(Clone)]
pub struct PgBaselineStore {
    pool: PgPool,
}

impl PgBaselineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaselineStore for PgBaselineStore {
    async fn baseline(&self, model_name: &str) -> Result<f64, MonitorError> {
        TrainingRunRepository::find_first(&self.pool, model_name)
            .await?
            .and_then(|run| run.metric(MAE_METRIC_KEY))
            .ok_or_else(|| MonitorError::BaselineNotFound(model_name.to_string()))
    }
}
