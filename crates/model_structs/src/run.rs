use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A completed training run and the metrics it logged.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrainingRun {
    pub id: Uuid,
    pub model_name: String,
    pub metrics: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl TrainingRun {
    /// Returns a numeric metric logged by this run.
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).and_then(serde_json::Value::as_f64)
    }
}
