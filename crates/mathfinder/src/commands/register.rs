//! Register command - adds a model version and its monitoring record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use config::Config;
use database::{
    CreateModelRecord, CreateModelVersion, CreateTrainingRun, ModelRecordRepository,
    ModelVersion, ModelVersionRepository, TrainingRunRepository,
};
use model_structs::{ColumnSpec, MAE_METRIC_KEY, ModelSchema, ModelSignature, SignatureColumn};
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectStorePath;
use object_store::{ObjectStore, PutPayload};
use predictor::SymbolicModel;
use sqlx::PgPool;
use tracing::info;

use crate::monitoring::TestQueue;

/// File name of the equations artifact inside a version's directory.
const ARTIFACT_FILE_NAME: &str = "model.json";

/// A trained model to add to the registry.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub owner_email: String,
    pub test_frequency_days: i32,
    pub schema: ModelSchema,
    /// Equations artifact produced by training
    pub artifact: PathBuf,
    /// Mean absolute error measured when the model was trained
    pub training_mae: f64,
}

/// Runs the register command.
///
/// The first registration of a name also sets the model's baseline; later
/// ones add a version and update the owner and frequency.
///
/// # Errors
///
/// Returns an error if the artifact does not fit the schema, or storing the
/// artifact or any row fails.
pub async fn run(pool: &PgPool, config: &Config, registration: Registration) -> Result<ModelVersion> {
    let Registration {
        name,
        owner_email,
        test_frequency_days,
        schema,
        artifact,
        training_mae,
    } = registration;

    if !training_mae.is_finite() || training_mae < 0.0 {
        anyhow::bail!("training MAE must be a non-negative number, got {training_mae}");
    }
    if test_frequency_days < 0 {
        anyhow::bail!("test frequency must not be negative, got {test_frequency_days}");
    }

    // Also rejects names that cannot be used as a directory.
    let inbox = TestQueue::new(&config.inbox_dir).inbox(&name)?;

    let bytes = tokio::fs::read(&artifact)
        .await
        .with_context(|| format!("Failed to read {}", artifact.display()))?;
    SymbolicModel::from_json(&bytes, schema.clone())
        .context("Artifact does not match the given columns")?;

    let version = ModelVersionRepository::next_version(pool, &name).await?;
    let artifact_path = format!("{name}/{version}/{ARTIFACT_FILE_NAME}");

    tokio::fs::create_dir_all(&config.artifact_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.artifact_dir.display()))?;
    let store = LocalFileSystem::new_with_prefix(&config.artifact_dir)?;
    store
        .put(&ObjectStorePath::from(artifact_path.as_str()), PutPayload::from(bytes))
        .await?;

    let model_version = ModelVersionRepository::create(
        pool,
        CreateModelVersion {
            name: name.clone(),
            version,
            artifact_path,
            signature: serde_json::to_value(signature_for(&schema))?,
        },
    )
    .await?;

    let now = Utc::now();
    TrainingRunRepository::create(
        pool,
        CreateTrainingRun {
            model_name: name.clone(),
            metrics: serde_json::json!({ MAE_METRIC_KEY: training_mae }),
            started_at: now,
            completed_at: now,
        },
    )
    .await?;

    ModelRecordRepository::upsert(
        pool,
        CreateModelRecord {
            name: name.clone(),
            owner_email,
            test_frequency_days,
            last_tested_date: Local::now().date_naive(),
        },
    )
    .await?;

    tokio::fs::create_dir_all(&inbox)
        .await
        .with_context(|| format!("Failed to create {}", inbox.display()))?;

    info!(
        model = %name,
        version,
        features = %schema.features,
        targets = %schema.targets,
        inbox = %inbox.display(),
        "Model registered"
    );

    Ok(model_version)
}

fn signature_for(schema: &ModelSchema) -> ModelSignature {
    let columns = |names: &ColumnSpec| -> Vec<SignatureColumn> {
        names
            .iter()
            .map(|name| SignatureColumn {
                name: name.to_string(),
            })
            .collect()
    };

    ModelSignature {
        inputs: columns(&schema.features),
        outputs: columns(&schema.targets),
    }
}
