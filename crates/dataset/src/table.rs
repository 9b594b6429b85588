use crate::DatasetError;

/// A named column of numeric values.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Numeric columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Builds a table, checking that every column has the same length.
    ///
    /// # Errors
    ///
    /// Returns an error if two columns differ in length.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let n_rows = columns.first().map_or(0, |c| c.values.len());

        if let Some(column) = columns.iter().find(|c| c.values.len() != n_rows) {
            return Err(DatasetError::LengthMismatch {
                column: column.name.clone(),
                expected: n_rows,
                actual: column.values.len(),
            });
        }

        Ok(Self { columns, n_rows })
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Values of one row, in column order.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.n_rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, values: &[f64]) -> Column {
        Column {
            name: name.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_table_rows() {
        let table = Table::new(vec![column("a", &[1.0, 2.0]), column("b", &[3.0, 4.0])]).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_columns(), 2);
        assert_eq!(table.row(1), Some(vec![2.0, 4.0]));
        assert_eq!(table.row(2), None);
        assert_eq!(table.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let err = Table::new(vec![column("a", &[1.0, 2.0]), column("b", &[3.0])]).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::LengthMismatch { ref column, expected: 2, actual: 1 } if column == "b"
        ));
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(Vec::new()).unwrap();
        assert_eq!(table.n_rows(), 0);
        assert_eq!(table.n_columns(), 0);
    }
}
