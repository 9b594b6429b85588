//! Per-model inboxes of pending test files.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dataset::{CsvFile, DatasetError, Table};
use model_structs::ModelSchema;
use tracing::{debug, warn};

use super::MonitorError;

/// Extension of the files picked up from an inbox (compared case-insensitively).
const TEST_FILE_EXTENSION: &str = "csv";

/// Why a pending file could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    /// Required feature or target columns are absent.
    MissingColumns(Vec<String>),
    /// The columns are present but the content cannot be used.
    Malformed(String),
}

/// A pending file that does not fit the model's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub file_name: String,
    pub kind: MismatchKind,
}

/// Test inputs and expected outputs read from one pending file.
#[derive(Debug, Clone)]
pub struct TestData {
    pub features: Table,
    pub targets: Table,
    /// The file the data came from, removed once the model has been scored.
    pub file: PathBuf,
}

/// Result of looking for test data for a model.
#[derive(Debug, Clone)]
pub enum DataResolution {
    /// Nothing is waiting in the inbox.
    NoData,
    /// The oldest file is present but unusable; it stays in the inbox.
    SchemaMismatch(SchemaMismatch),
    Ready(TestData),
}

/// Inbox directories rooted at one folder, one subdirectory per model.
#[derive(Debug, Clone)]
pub struct TestQueue {
    root: PathBuf,
}

impl TestQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory where test files for `model_name` are expected.
    ///
    /// # Errors
    ///
    /// Returns an error if the name would escape the inbox root.
    pub fn inbox(&self, model_name: &str) -> Result<PathBuf, MonitorError> {
        let trimmed = model_name.trim();
        if trimmed.is_empty()
            || trimmed == "."
            || trimmed == ".."
            || trimmed.contains(['/', '\\'])
        {
            return Err(MonitorError::InvalidModelName(model_name.to_string()));
        }
        Ok(self.root.join(model_name))
    }

    /// Pending test files, oldest modification time first.
    ///
    /// Files sharing a modification time are ordered by name. A missing inbox
    /// is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the inbox exists but cannot be listed.
    pub fn pending_files(&self, model_name: &str) -> Result<Vec<PathBuf>, MonitorError> {
        let inbox = self.inbox(model_name)?;
        let io_error = |source| MonitorError::Io {
            path: inbox.clone(),
            source,
        };

        if !inbox.is_dir() {
            debug!(model = model_name, inbox = %inbox.display(), "Inbox does not exist");
            return Ok(Vec::new());
        }

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();

        for entry in std::fs::read_dir(&inbox).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let path = entry.path();

            if !path.is_file() || !has_test_extension(&path) {
                continue;
            }

            let modified = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .map_err(|source| MonitorError::Io {
                    path: path.clone(),
                    source,
                })?;

            files.push((modified, path));
        }

        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Loads the oldest pending file and projects it onto the model's columns.
    ///
    /// Nothing is removed here; see [`TestQueue::consume`].
    ///
    /// # Errors
    ///
    /// Returns an error only for filesystem failures. Content problems are
    /// reported as [`DataResolution::SchemaMismatch`].
    pub fn resolve(
        &self,
        model_name: &str,
        schema: &ModelSchema,
    ) -> Result<DataResolution, MonitorError> {
        let Some(path) = self.pending_files(model_name)?.into_iter().next() else {
            return Ok(DataResolution::NoData);
        };

        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        debug!(model = model_name, file = %file_name, "Loading oldest test file");

        let mismatch = |kind: MismatchKind| -> Result<DataResolution, MonitorError> {
            warn!(model = model_name, file = %file_name, ?kind, "Test file does not fit the model");
            Ok(DataResolution::SchemaMismatch(SchemaMismatch {
                file_name: file_name.clone(),
                kind,
            }))
        };

        let csv = match CsvFile::from_path(&path) {
            Ok(csv) => csv,
            Err(e) if e.is_io() => {
                return Err(MonitorError::Io {
                    path,
                    source: std::io::Error::other(e.to_string()),
                });
            }
            Err(e) => return mismatch(MismatchKind::Malformed(e.to_string())),
        };

        let mut missing: Vec<String> = Vec::new();
        for name in csv
            .missing_columns(&schema.features)
            .into_iter()
            .chain(csv.missing_columns(&schema.targets))
        {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }

        if !missing.is_empty() {
            return mismatch(MismatchKind::MissingColumns(missing));
        }

        let projected = csv
            .select(&schema.features)
            .and_then(|features| Ok((features, csv.select(&schema.targets)?)));

        match projected {
            Ok((features, targets)) => Ok(DataResolution::Ready(TestData {
                features,
                targets,
                file: path,
            })),
            Err(DatasetError::MissingColumns { missing }) => {
                mismatch(MismatchKind::MissingColumns(missing))
            }
            Err(e) => mismatch(MismatchKind::Malformed(e.to_string())),
        }
    }

    /// Removes a file whose data has been scored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn consume(&self, file: &Path) -> Result<(), MonitorError> {
        std::fs::remove_file(file).map_err(|source| MonitorError::Io {
            path: file.to_path_buf(),
            source,
        })
    }
}

fn has_test_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TEST_FILE_EXTENSION))
}
