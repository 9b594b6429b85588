//! Resolution of model names to their latest registered version.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use database::ModelVersionRepository;
use model_structs::{ModelSchema, ModelVersion};
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectStorePath;
use predictor::{Predictor, SymbolicModel};
use sqlx::PgPool;
use tracing::debug;

use super::MonitorError;

/// A resolved model version and the columns it works with.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub name: String,
    pub version: i32,
    pub schema: ModelSchema,
    pub artifact_path: String,
}

impl TryFrom<ModelVersion> for ModelHandle {
    type Error = MonitorError;

    fn try_from(version: ModelVersion) -> Result<Self, Self::Error> {
        let invalid = |reason: String| MonitorError::InvalidSignature {
            model: version.name.clone(),
            reason,
        };

        let schema = version
            .signature()
            .map_err(|e| invalid(e.to_string()))?
            .column_specs()
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name: version.name,
            version: version.version,
            schema,
            artifact_path: version.artifact_path,
        })
    }
}

/// Source of registered models.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Resolves the latest registered version of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ModelNotFound`] if the model has no versions.
    async fn latest(&self, name: &str) -> Result<ModelHandle, MonitorError>;

    /// Loads a fresh predictor for a resolved version.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read or decoded.
    async fn load_predictor(&self, handle: &ModelHandle) -> Result<Box<dyn Predictor>, MonitorError>;
}

/// Registry backed by the `model_versions` table and an artifact store.
#[derive(Clone)]
pub struct PgModelRegistry {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
}

impl PgModelRegistry {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }

    /// Creates a registry reading artifacts from a local directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be used as an object store.
    pub fn with_local_artifacts(pool: PgPool, artifact_dir: &Path) -> Result<Self, MonitorError> {
        std::fs::create_dir_all(artifact_dir).map_err(|source| MonitorError::Io {
            path: artifact_dir.to_path_buf(),
            source,
        })?;
        let store = LocalFileSystem::new_with_prefix(artifact_dir)?;
        Ok(Self::new(pool, Arc::new(store)))
    }

    /// Resolves a specific version of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::ModelNotFound`] if that version does not exist.
    pub async fn version(&self, name: &str, version: i32) -> Result<ModelHandle, MonitorError> {
        ModelVersionRepository::find_by_name_version(&self.pool, name, version)
            .await?
            .ok_or_else(|| MonitorError::ModelNotFound(format!("{name} (version {version})")))?
            .try_into()
    }
}

#[async_trait]
impl ModelRegistry for PgModelRegistry {
    async fn latest(&self, name: &str) -> Result<ModelHandle, MonitorError> {
        let version = ModelVersionRepository::find_latest(&self.pool, name)
            .await?
            .ok_or_else(|| MonitorError::ModelNotFound(name.to_string()))?;

        debug!(model = name, version = version.version, "Resolved latest model version");
        version.try_into()
    }

    async fn load_predictor(&self, handle: &ModelHandle) -> Result<Box<dyn Predictor>, MonitorError> {
        let location = ObjectStorePath::from(handle.artifact_path.as_str());
        let bytes = self.store.get(&location).await?.bytes().await?;

        let model = SymbolicModel::from_json(&bytes, handle.schema.clone())?;
        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn version_row(signature: serde_json::Value) -> ModelVersion {
        ModelVersion {
            id: Default::default(),
            name: "sales_model".to_string(),
            version: 3,
            artifact_path: "sales_model/3/model.json".to_string(),
            signature,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_handle_from_version() {
        let handle = ModelHandle::try_from(version_row(serde_json::json!({
            "inputs": [{"name": "Temperature"}],
            "outputs": [{"name": "Sales"}],
        })))
        .unwrap();

        assert_eq!(handle.version, 3);
        assert_eq!(handle.schema.features.names(), ["Temperature"]);
        assert_eq!(handle.artifact_path, "sales_model/3/model.json");
    }

    #[test]
    fn test_handle_rejects_bad_signature() {
        let err = ModelHandle::try_from(version_row(serde_json::json!({"inputs": []}))).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidSignature { ref model, .. } if model == "sales_model"));
    }

    #[tokio::test]
    async fn test_local_artifact_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("sales_model/3");
        std::fs::create_dir_all(&artifact).unwrap();
        std::fs::write(artifact.join("model.json"), r#"{"equations": ["x0 + 1"]}"#).unwrap();

        let store: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(dir.path()).unwrap());
        let location = ObjectStorePath::from("sales_model/3/model.json");
        let bytes = store.get(&location).await.unwrap().bytes().await.unwrap();

        let handle = ModelHandle::try_from(version_row(serde_json::json!({
            "inputs": [{"name": "Temperature"}],
            "outputs": [{"name": "Sales"}],
        })))
        .unwrap();
        let model = SymbolicModel::from_json(&bytes, handle.schema).unwrap();
        assert_eq!(model.equations().collect::<Vec<_>>(), vec!["x0 + 1"]);
    }
}
