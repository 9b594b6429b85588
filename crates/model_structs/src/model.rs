use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ColumnSpec, ColumnSpecError};

/// A registered version of a model, as stored in the model registry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModelVersion {
    pub id: Uuid,
    pub name: String,
    pub version: i32,
    /// Location of the serialized model inside the artifact store.
    pub artifact_path: String,
    /// Input/output signature captured when the version was logged.
    pub signature: serde_json::Value,
    pub registered_at: DateTime<Utc>,
}

impl ModelVersion {
    /// Decodes the stored signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored JSON does not describe a signature.
    pub fn signature(&self) -> Result<ModelSignature, serde_json::Error> {
        serde_json::from_value(self.signature.clone())
    }
}

/// A single named column of a model signature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SignatureColumn {
    pub name: String,
}

/// Ordered input and output columns a model was trained on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelSignature {
    pub inputs: Vec<SignatureColumn>,
    pub outputs: Vec<SignatureColumn>,
}

impl ModelSignature {
    /// Builds the validated feature and target column lists.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is empty or names a column twice.
    pub fn column_specs(&self) -> Result<ModelSchema, ColumnSpecError> {
        Ok(ModelSchema {
            features: ColumnSpec::new(self.inputs.iter().map(|c| c.name.clone()))?,
            targets: ColumnSpec::new(self.outputs.iter().map(|c| c.name.clone()))?,
        })
    }
}

/// Feature and target columns expected by a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSchema {
    pub features: ColumnSpec,
    pub targets: ColumnSpec,
}
