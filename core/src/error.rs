use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    /// A required raw column is absent. Fatal: no partial output.
    #[error("Schema error at {stage}: missing required columns {missing:?}")]
    Schema {
        stage: &'static str,
        missing: Vec<String>,
    },

    #[error("Column '{name}' already exists")]
    DuplicateColumn { name: String },

    #[error("Column '{name}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EtlResult<T> = Result<T, EtlError>;
