//! Predict command - appends model predictions to a CSV file.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use config::Config;
use dataset::{Column, CsvFile, DatasetError, Table};
use model_structs::ColumnSpec;
use sqlx::PgPool;
use tracing::info;

use super::{ColumnOverrides, resolve_model};
use crate::monitoring::{ModelHandle, ModelRegistry as _, PgModelRegistry};

/// Suffix of the columns holding predicted values.
const PREDICTION_SUFFIX: &str = "_prediction";

/// Runs the predict command.
///
/// Every row of `file` is written to `output` followed by one predicted
/// value per target.
///
/// # Errors
///
/// Returns an error if the model or the input cannot be loaded, prediction
/// fails, or the output cannot be written.
pub async fn run(
    pool: &PgPool,
    config: &Config,
    model: &str,
    version: Option<i32>,
    file: &Path,
    output: &Path,
    features: Option<ColumnSpec>,
) -> Result<()> {
    info!(model, ?version, input = %file.display(), output = %output.display(), "Predicting");

    let registry = PgModelRegistry::with_local_artifacts(pool.clone(), &config.artifact_dir)?;
    let handle = resolve_model(&registry, model, version).await?;
    let overrides = ColumnOverrides {
        features,
        targets: None,
    };
    let handle = ModelHandle {
        schema: overrides.apply(handle.schema.clone()),
        ..handle
    };

    let csv = CsvFile::from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let inputs = csv.select(&handle.schema.features)?;

    let predictor = registry.load_predictor(&handle).await?;
    let predictions = prediction_columns(&predictor.predict(&inputs)?)?;

    let writer = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    csv.write_with_columns(writer, &predictions)?;

    info!(rows = predictions.n_rows(), columns = ?predictions.column_names(), "Predictions written");
    Ok(())
}

/// Renames each predicted target column to `<target>_prediction`.
fn prediction_columns(predictions: &Table) -> Result<Table, DatasetError> {
    Table::new(
        predictions
            .columns()
            .iter()
            .map(|column| Column {
                name: format!("{}{PREDICTION_SUFFIX}", column.name),
                values: column.values.clone(),
            })
            .collect(),
    )
}
