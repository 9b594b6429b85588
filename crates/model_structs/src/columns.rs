//! Validated, ordered lists of column names.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

/// Separator accepted between column names in free-text input.
pub const COLUMN_SEPARATOR: char = ';';

/// Reasons a column list is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnSpecError {
    #[error("at least one column name is required")]
    Empty,
    #[error("column name at position {position} is blank")]
    Blank { position: usize },
    #[error("column '{0}' is listed more than once")]
    Duplicate(String),
}

/// An ordered list of column names with no blanks and no duplicates.
///
/// Names are trimmed once, here, so lookups never have to deal with stray
/// whitespace around the separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    names: Vec<String>,
}

impl ColumnSpec {
    /// Builds a column list from individual names.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, a name is blank after trimming,
    /// or a name appears twice.
    pub fn new<I, S>(names: I) -> Result<Self, ColumnSpecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();

        for (position, name) in names.into_iter().enumerate() {
            let name = name.as_ref().trim();
            if name.is_empty() {
                return Err(ColumnSpecError::Blank { position });
            }
            if normalized.iter().any(|existing| existing == name) {
                return Err(ColumnSpecError::Duplicate(name.to_string()));
            }
            normalized.push(name.to_string());
        }

        if normalized.is_empty() {
            return Err(ColumnSpecError::Empty);
        }

        Ok(Self { names: normalized })
    }

    /// Column names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl FromStr for ColumnSpec {
    type Err = ColumnSpecError;

    /// Parses `"a; b;c"` style input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ColumnSpecError::Empty);
        }
        Self::new(s.split(COLUMN_SEPARATOR))
    }
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(", "))
    }
}
