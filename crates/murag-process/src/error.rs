//! Error types for media processing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for processing operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Errors that can occur during media processing.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Tool not found: {tool}. Please install it.")]
    ToolNotFound { tool: String },

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("OCR error: {0}")]
    OcrError(String),

    #[error("Rasterization error: {0}")]
    RasterizeError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ProcessError {
    /// Whether running the same job again could succeed.
    ///
    /// A missing tool counts as retryable: installing it fixes the job.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Io(_)
            | ProcessError::ToolNotFound { .. }
            | ProcessError::TranscriptionError(_)
            | ProcessError::OcrError(_)
            | ProcessError::RasterizeError(_) => true,
            ProcessError::FileNotFound(_) | ProcessError::ParseError(_) => false,
        }
    }
}
