//! Column-oriented record set.
//!
//! RULE: `None` is the one and only "unset" marker.
//! Every column in a table has exactly `n_rows` cells and
//! column names are unique.

use crate::error::{EtlError, EtlResult};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

/// Column name -> dtype label, as handed to a plan provider.
pub type SchemaSummary = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    /// Dtype label shown to external collaborators.
    pub fn dtype(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "float64",
            Self::Text(_) => "object",
        }
    }

    pub fn is_unset(&self, row: usize) -> bool {
        match self {
            Self::Numeric(v) => v[row].is_none(),
            Self::Text(v) => v[row].is_none(),
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Self::Numeric(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match self {
            Self::Text(v) => Some(v),
            Self::Numeric(_) => None,
        }
    }

    /// Cell rendered as text. Used for identifier-like columns
    /// (customer, merchant, category) which may load as numbers.
    pub fn cell_text(&self, row: usize) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(v) => v[row].as_deref().map(Cow::Borrowed),
            Self::Numeric(v) => v[row].map(|x| Cow::Owned(format!("{x}"))),
        }
    }

    /// Convert to a text column. Numbers keep their shortest rendering.
    pub fn into_text(self) -> Column {
        match self {
            Self::Text(v) => Self::Text(v),
            Self::Numeric(v) => {
                Self::Text(v.into_iter().map(|x| x.map(|x| format!("{x}"))).collect())
            }
        }
    }

    fn retain_rows(&mut self, keep: &[bool]) {
        match self {
            Self::Numeric(v) => retain_by_mask(v, keep),
            Self::Text(v) => retain_by_mask(v, keep),
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut idx = 0;
    values.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
    /// Numeric columns that hold category codes rather than measurements.
    encoded: BTreeSet<String>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from (name, column) pairs.
    pub fn from_columns<I, S>(columns: I) -> EtlResult<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, column) in columns {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        match self.position(name) {
            Some(i) => Some(&mut self.columns[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Append a new column. The first column fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> EtlResult<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(EtlError::DuplicateColumn { name });
        }
        self.check_len(&name, &column)?;
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Replace a column in place, or append it if absent. A replaced
    /// column loses its encoded marker.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> EtlResult<()> {
        let name = name.into();
        match self.position(&name) {
            Some(i) => {
                self.check_len(&name, &column)?;
                self.columns[i] = column;
                self.encoded.remove(&name);
                Ok(())
            }
            None => self.push_column(name, column),
        }
    }

    /// Replace a column with category codes and mark it as encoded.
    pub fn set_encoded_column(&mut self, name: impl Into<String>, codes: Vec<i64>) -> EtlResult<()> {
        let name = name.into();
        let codes = codes.into_iter().map(|c| Some(c as f64)).collect();
        self.set_column(name.clone(), Column::Numeric(codes))?;
        self.encoded.insert(name);
        Ok(())
    }

    pub fn is_encoded(&self, name: &str) -> bool {
        self.encoded.contains(name)
    }

    /// Fail with a schema error naming every absent column.
    pub fn require(&self, stage: &'static str, names: &[&str]) -> EtlResult<()> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| !self.has_column(n))
            .map(|n| n.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EtlError::Schema { stage, missing })
        }
    }

    /// Keep only the rows whose mask entry is true.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.n_rows);
        for column in &mut self.columns {
            column.retain_rows(keep);
        }
        self.n_rows = keep.iter().filter(|k| **k).count();
    }

    pub fn schema_summary(&self) -> SchemaSummary {
        self.iter()
            .map(|(name, col)| (name.to_string(), col.dtype().to_string()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn check_len(&self, name: &str, column: &Column) -> EtlResult<()> {
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(EtlError::RowCountMismatch {
                name: name.to_string(),
                expected: self.n_rows,
                actual: column.len(),
            });
        }
        Ok(())
    }
}
