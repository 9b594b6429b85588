//! CLI command implementations.

pub mod monitor;
pub mod predict;
pub mod register;

use anyhow::{Context, Result};
use model_structs::{ColumnSpec, ModelSchema};

use crate::monitoring::{ModelHandle, MonitorError, PgModelRegistry};

/// Column lists given on the command line in place of the registered ones.
#[derive(Debug, Clone, Default)]
pub struct ColumnOverrides {
    pub features: Option<ColumnSpec>,
    pub targets: Option<ColumnSpec>,
}

impl ColumnOverrides {
    /// Parses semicolon-separated column lists.
    ///
    /// # Errors
    ///
    /// Returns an error if a list is empty or repeats a column.
    pub fn parse(features: Option<&str>, targets: Option<&str>) -> Result<Self> {
        Ok(Self {
            features: features
                .map(str::parse::<ColumnSpec>)
                .transpose()
                .context("invalid feature columns")?,
            targets: targets
                .map(str::parse::<ColumnSpec>)
                .transpose()
                .context("invalid target columns")?,
        })
    }

    #[must_use]
    pub fn apply(&self, schema: ModelSchema) -> ModelSchema {
        ModelSchema {
            features: self.features.clone().unwrap_or(schema.features),
            targets: self.targets.clone().unwrap_or(schema.targets),
        }
    }
}

/// Resolves `version` of `model`, or its latest version.
async fn resolve_model(
    registry: &PgModelRegistry,
    model: &str,
    version: Option<i32>,
) -> Result<ModelHandle> {
    use crate::monitoring::ModelRegistry as _;

    let resolved = match version {
        Some(version) => registry.version(model, version).await,
        None => registry.latest(model).await,
    };

    match resolved {
        Err(MonitorError::ModelNotFound(_)) => {
            anyhow::bail!("No model named '{model}' was found")
        }
        other => Ok(other?),
    }
}
