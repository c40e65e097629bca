//! Purely numeric feature matrix handed to the training collaborator.

use serde::Serialize;

/// Where a matrix column came from. Encoded columns hold category codes
/// and are never rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Continuous,
    Encoded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixColumn {
    pub name:   String,
    pub kind:   ColumnKind,
    pub values: Vec<f64>,
}

/// Column-major matrix. Column order is the pruned plan order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureMatrix {
    columns: Vec<MatrixColumn>,
    n_rows:  usize,
}

impl FeatureMatrix {
    /// An empty matrix that still knows how many rows it describes.
    pub fn with_rows(n_rows: usize) -> Self {
        Self { columns: Vec::new(), n_rows }
    }

    pub(crate) fn push(&mut self, column: MatrixColumn) {
        debug_assert_eq!(column.values.len(), self.n_rows);
        self.columns.push(column);
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[MatrixColumn] {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [MatrixColumn] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c.values[row]).collect()
    }
}
