//! API errors and their HTTP status codes.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use murag_db::DbError;
use murag_ingest::IngestError;
use murag_rag::RagError;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::InvalidCitation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Database(e) => e.into(),
            IngestError::TooLarge { .. } => ApiError::TooLarge(err.to_string()),
            IngestError::EmptyUpload
            | IngestError::UnsupportedFileType(_)
            | IngestError::FileNotFound(_) => ApiError::BadRequest(err.to_string()),
            IngestError::Embedding(ref e) if e.is_unavailable() => {
                ApiError::Unavailable(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        if err.is_unavailable() {
            return ApiError::Unavailable(err.to_string());
        }
        match err {
            RagError::NotFound(msg) => ApiError::NotFound(msg),
            RagError::EmptyQuery | RagError::InvalidTimestamp(_) => {
                ApiError::BadRequest(err.to_string())
            }
            RagError::Database(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge(err.body_text())
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

/// Run a database or filesystem call on the blocking pool.
pub async fn blocking<T, E, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    ApiError: From<E>,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murag_ollama::OllamaError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (DbError::NotFound("doc".into()).into(), StatusCode::NOT_FOUND),
            (IngestError::EmptyUpload.into(), StatusCode::BAD_REQUEST),
            (
                IngestError::UnsupportedFileType(".txt".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                IngestError::TooLarge { size: 10, max: 5 }.into(),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (RagError::EmptyQuery.into(), StatusCode::BAD_REQUEST),
            (RagError::Timeout { seconds: 60 }.into(), StatusCode::SERVICE_UNAVAILABLE),
            (
                RagError::Model(OllamaError::ModelNotFound { model: "m".into() }).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (RagError::NotFound("citation".into()).into(), StatusCode::NOT_FOUND),
            (
                RagError::Model(OllamaError::InvalidResponse("bad".into())).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status(), status, "{}", err);
        }
    }

    #[tokio::test]
    async fn test_blocking_maps_errors() {
        let value = blocking(|| Ok::<_, DbError>(7)).await.unwrap();
        assert_eq!(value, 7);

        let err = blocking(|| Err::<(), _>(DbError::NotFound("doc".into())))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
