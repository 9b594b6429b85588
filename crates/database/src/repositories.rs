//! Repository functions for database operations.

use chrono::{DateTime, NaiveDate, Utc};
use model_structs::{ModelRecord, ModelVersion, TrainingRun};
use sqlx::PgPool;
use uuid::Uuid;

/// Input for registering a model for monitoring.
#[derive(Debug, Clone)]
pub struct CreateModelRecord {
    pub name: String,
    pub owner_email: String,
    pub test_frequency_days: i32,
    pub last_tested_date: NaiveDate,
}

/// Input for registering a new model version.
#[derive(Debug, Clone)]
pub struct CreateModelVersion {
    pub name: String,
    pub version: i32,
    pub artifact_path: String,
    pub signature: serde_json::Value,
}

/// Input for recording a finished training run.
#[derive(Debug, Clone)]
pub struct CreateTrainingRun {
    pub model_name: String,
    pub metrics: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Repository for the per-model monitoring records.
pub struct ModelRecordRepository;

impl ModelRecordRepository {
    /// Creates a monitoring record, or replaces the owner and frequency of an
    /// existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn upsert(pool: &PgPool, input: CreateModelRecord) -> Result<ModelRecord, sqlx::Error> {
        sqlx::query_as::<_, ModelRecord>(
            r"
            INSERT INTO monitored_models (name, owner_email, test_frequency_days, last_tested_date)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO UPDATE
            SET owner_email = EXCLUDED.owner_email,
                test_frequency_days = EXCLUDED.test_frequency_days
            RETURNING name, owner_email, test_frequency_days, last_tested_date
            ",
        )
        .bind(&input.name)
        .bind(&input.owner_email)
        .bind(input.test_frequency_days)
        .bind(input.last_tested_date)
        .fetch_one(pool)
        .await
    }

    /// Lists every monitored model.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<ModelRecord>, sqlx::Error> {
        sqlx::query_as::<_, ModelRecord>(
            r"
            SELECT name, owner_email, test_frequency_days, last_tested_date
            FROM monitored_models
            ORDER BY name
            ",
        )
        .fetch_all(pool)
        .await
    }

    /// Finds the monitoring record of a model.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<ModelRecord>, sqlx::Error> {
        sqlx::query_as::<_, ModelRecord>(
            r"
            SELECT name, owner_email, test_frequency_days, last_tested_date
            FROM monitored_models
            WHERE name = $1
            ",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Records that a model was tested on `date`.
    ///
    /// The stored date never moves backwards. Returns the number of records
    /// touched, which is 0 when the model has no record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn update_last_tested(
        pool: &PgPool,
        name: &str,
        date: NaiveDate,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE monitored_models
            SET last_tested_date = GREATEST(last_tested_date, $2)
            WHERE name = $1
            ",
        )
        .bind(name)
        .bind(date)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Repository for registered model versions.
pub struct ModelVersionRepository;

impl ModelVersionRepository {
    /// Registers a new model version.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(pool: &PgPool, input: CreateModelVersion) -> Result<ModelVersion, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, ModelVersion>(
            r"
            INSERT INTO model_versions (id, name, version, artifact_path, signature)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, version, artifact_path, signature, registered_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.version)
        .bind(&input.artifact_path)
        .bind(&input.signature)
        .fetch_one(pool)
        .await
    }

    /// Gets the latest version of a model by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_latest(pool: &PgPool, name: &str) -> Result<Option<ModelVersion>, sqlx::Error> {
        sqlx::query_as::<_, ModelVersion>(
            r"
            SELECT id, name, version, artifact_path, signature, registered_at
            FROM model_versions
            WHERE name = $1
            ORDER BY version DESC
            LIMIT 1
            ",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Finds a specific version of a model.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_by_name_version(
        pool: &PgPool,
        name: &str,
        version: i32,
    ) -> Result<Option<ModelVersion>, sqlx::Error> {
        sqlx::query_as::<_, ModelVersion>(
            r"
            SELECT id, name, version, artifact_path, signature, registered_at
            FROM model_versions
            WHERE name = $1 AND version = $2
            ",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(pool)
        .await
    }

    /// Gets the next version number for a model name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn next_version(pool: &PgPool, name: &str) -> Result<i32, sqlx::Error> {
        let max_version: Option<i32> =
            sqlx::query_scalar("SELECT MAX(version) FROM model_versions WHERE name = $1")
                .bind(name)
                .fetch_one(pool)
                .await?;

        Ok(max_version.unwrap_or(0) + 1)
    }
}

/// Repository for training runs.
pub struct TrainingRunRepository;

impl TrainingRunRepository {
    /// Records a finished training run.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(pool: &PgPool, input: CreateTrainingRun) -> Result<TrainingRun, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, TrainingRun>(
            r"
            INSERT INTO training_runs (id, model_name, metrics, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, model_name, metrics, started_at, completed_at
            ",
        )
        .bind(id)
        .bind(&input.model_name)
        .bind(&input.metrics)
        .bind(input.started_at)
        .bind(input.completed_at)
        .fetch_one(pool)
        .await
    }

    /// Finds the earliest completed run of a model.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn find_first(pool: &PgPool, model_name: &str) -> Result<Option<TrainingRun>, sqlx::Error> {
        sqlx::query_as::<_, TrainingRun>(
            r"
            SELECT id, model_name, metrics, started_at, completed_at
            FROM training_runs
            WHERE model_name = $1
            ORDER BY completed_at ASC
            LIMIT 1
            ",
        )
        .bind(model_name)
        .fetch_optional(pool)
        .await
    }
}
