use thiserror::Error;

pub use sqlx::Error as StorageError;

/// Failures while turning uploaded bytes into a table.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No columns to parse from file")]
    Empty,

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("Expected {expected} fields in line {line}, saw {found}")]
    UnevenRow {
        line: u64,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    /// The caller sent something unusable (empty rows, no known column, ...)
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Erro ao processar CSV: {0}")]
    Ingest(#[from] IngestError),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl DatasetError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DatasetError::Invalid(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        DatasetError::NotFound(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, DatasetError::Storage(_))
    }
}

pub type Result<T, E = DatasetError> = std::result::Result<T, E>;
