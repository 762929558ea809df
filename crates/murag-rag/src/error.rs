//! Error types for retrieval and answering.

use murag_db::DbError;
use murag_ollama::OllamaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Query is empty")]
    EmptyQuery,

    #[error("Answer timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Model error: {0}")]
    Model(#[from] OllamaError),

    #[error("Query embedding has {actual} dimensions, index has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for RagError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => RagError::NotFound(what),
            other => RagError::Database(other),
        }
    }
}

impl RagError {
    /// Whether the language model could not be reached in time.
    pub fn is_unavailable(&self) -> bool {
        match self {
            RagError::Timeout { .. } => true,
            RagError::Model(e) => e.is_unavailable(),
            _ => false,
        }
    }
}

pub type RagResult<T> = Result<T, RagError>;
