use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use model_structs::ColumnSpec;

use crate::{Column, DatasetError, Table};

/// Cell contents treated as missing values.
const INVALID_VALUES: &[&str] = &[
    "", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

/// Header prefix of the index columns spreadsheet exports leave behind.
const UNNAMED_COLUMN_PREFIX: &str = "Unnamed";

/// A CSV file held as text, with index artifacts already dropped.
#[derive(Debug, Clone)]
pub struct CsvFile {
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl CsvFile {
    /// Reads a CSV file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not valid CSV.
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
        Self::from_csv(reader)
    }

    /// Reads CSV data from any reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid CSV.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        Self::from_csv(ReaderBuilder::new().trim(Trim::All).from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DatasetError> {
        let raw_headers = reader.headers()?.clone();

        // Keep only the columns that carry a real name.
        let kept: Vec<usize> = raw_headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && !name.starts_with(UNNAMED_COLUMN_PREFIX))
            .map(|(index, _)| index)
            .collect();

        let headers = kept.iter().map(|&i| raw_headers[i].to_string()).collect();

        let mut records: Vec<StringRecord> = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(kept.iter().map(|&i| record.get(i).unwrap_or("")).collect());
        }

        Ok(Self { headers, records })
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.records.len()
    }

    /// Names from `spec` that are not present in the file.
    #[must_use]
    pub fn missing_columns<'a>(&self, spec: &'a ColumnSpec) -> Vec<&'a str> {
        spec.iter()
            .filter(|name| !self.headers.iter().any(|h| h == name))
            .collect()
    }

    /// Converts the requested columns to numbers, in the order of `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing, the file has no rows, or a
    /// requested cell is empty or not a finite number.
    pub fn select(&self, spec: &ColumnSpec) -> Result<Table, DatasetError> {
        let missing = self.missing_columns(spec);
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns {
                missing: missing.into_iter().map(str::to_string).collect(),
            });
        }

        if self.records.is_empty() {
            return Err(DatasetError::NoRows);
        }

        let mut columns = Vec::with_capacity(spec.len());
        for name in spec.iter() {
            let Some(index) = self.headers.iter().position(|h| h == name) else {
                continue;
            };

            let mut values = Vec::with_capacity(self.records.len());
            for (row, record) in self.records.iter().enumerate() {
                let raw = record.get(index).unwrap_or("");
                values.push(parse_value(raw).ok_or_else(|| DatasetError::InvalidValue {
                    column: name.to_string(),
                    row: row + 1,
                    value: raw.to_string(),
                })?);
            }

            columns.push(Column {
                name: name.to_string(),
                values,
            });
        }

        Table::new(columns)
    }

    /// Writes every original row followed by the columns of `extra`.
    ///
    /// # Errors
    ///
    /// Returns an error if `extra` does not have one row per record or the
    /// writer fails.
    pub fn write_with_columns<W: Write>(&self, writer: W, extra: &Table) -> Result<(), DatasetError> {
        if extra.n_rows() != self.records.len() {
            let column = extra.column_names().first().map_or_else(String::new, |n| (*n).to_string());
            return Err(DatasetError::LengthMismatch {
                column,
                expected: self.records.len(),
                actual: extra.n_rows(),
            });
        }

        let mut writer = WriterBuilder::new().from_writer(writer);

        let mut header: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        header.extend(extra.column_names());
        writer.write_record(&header)?;

        for (row, record) in self.records.iter().enumerate() {
            let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
            fields.extend(extra.columns().iter().map(|c| c.values[row].to_string()));
            writer.write_record(&fields)?;
        }

        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    if INVALID_VALUES.contains(&raw) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
