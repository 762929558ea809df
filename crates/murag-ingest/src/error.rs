//! Error types for ingestion and the processing pipeline.

use murag_db::DbError;
use murag_ollama::OllamaError;
use murag_process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur during ingestion and processing.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Upload is empty")]
    EmptyUpload,

    #[error("Upload of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ProcessError),

    #[error("Parse error for {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("No text could be extracted from {0}")]
    NoContent(String),

    #[error("{0} is disabled in the processing configuration")]
    Disabled(&'static str),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] OllamaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Whether a failed job should be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Io(_) | IngestError::Embedding(_) | IngestError::Internal(_) => true,
            IngestError::Extraction(e) => e.is_retryable(),
            IngestError::Database(e) => !matches!(
                e,
                DbError::DimensionMismatch { .. } | DbError::NotFound(_)
            ),
            IngestError::FileNotFound(_)
            | IngestError::UnsupportedFileType(_)
            | IngestError::EmptyUpload
            | IngestError::TooLarge { .. }
            | IngestError::ParseError { .. }
            | IngestError::NoContent(_)
            | IngestError::Disabled(_) => false,
        }
    }
}
