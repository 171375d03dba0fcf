use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Snapshot file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Data not found in snapshot: '{key}'")]
    DataNotFound { key: String },

    #[error("Domain error: {0}")]
    DomainError(String),

    #[error("Length mismatch for '{field}': expected {expected} entries, found {found}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Malformed SDF file: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

impl AnalysisError {
    /// Shorthand for building a [`AnalysisError::DomainError`].
    pub fn domain(message: impl Into<String>) -> Self {
        AnalysisError::DomainError(message.into())
    }
}
