use async_trait::async_trait;
use chrono::NaiveDate;
use database::ModelRecordRepository;
use model_structs::ModelRecord;
use sqlx::PgPool;

use super::MonitorError;

/// Persistent monitoring state of every model.
#[async_trait]
pub trait StateTracker: Send + Sync {
    /// Every monitored model.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. A monitoring pass cannot
    /// continue without this list.
    async fn load_all(&self) -> Result<Vec<ModelRecord>, MonitorError>;

    /// Records a test attempt on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written or the model has no
    /// record.
    async fn update_last_tested(&self, model_name: &str, date: NaiveDate) -> Result<(), MonitorError>;
}

/// State kept in the `monitored_models` table.
#[derive(Clone)]
pub struct PgStateTracker {
    pool: PgPool,
}

impl PgStateTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateTracker for PgStateTracker {
    async fn load_all(&self) -> Result<Vec<ModelRecord>, MonitorError> {
        Ok(ModelRecordRepository::list_all(&self.pool).await?)
    }

    async fn update_last_tested(&self, model_name: &str, date: NaiveDate) -> Result<(), MonitorError> {
        let updated = ModelRecordRepository::update_last_tested(&self.pool, model_name, date).await?;
        if updated == 0 {
            return Err(MonitorError::RecordNotFound(model_name.to_string()));
        }
        Ok(())
    }
}
