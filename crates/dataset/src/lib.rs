//! Tabular data loading for model testing and prediction.
//!
//! CSV files are read as text and only the columns a caller asks for are
//! converted to numbers, so a test file may carry extra non-numeric columns
//! (ids, dates, free text) without being rejected.

mod csv_file;
mod table;

pub use csv_file::CsvFile;
pub use table::{Column, Table};

use thiserror::Error;

/// Errors raised while loading or projecting tabular data.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read CSV data: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("the file contains no data rows")]
    NoRows,

    #[error("column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

impl DatasetError {
    /// Whether the error comes from the underlying reader rather than from the
    /// content of the file.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Csv(e) if e.is_io_error())
    }
}
