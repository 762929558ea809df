//! Document upload and management endpoints.

use crate::error::{blocking, ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use murag_core::{Document, DocumentStatus};
use murag_db::DocumentDeletion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document: Document,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub chunk_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReprocessResponse {
    pub id: String,
    pub queued: bool,
}

/// POST /api/documents - multipart upload of a single file
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        tracing::info!("Received upload {} ({} bytes)", filename, bytes.len());

        let ingestor = state.ingestor.clone();
        let outcome = blocking(move || ingestor.upload(&filename, &bytes, mime.as_deref())).await?;

        let status = if outcome.was_duplicate {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        return Ok((
            status,
            Json(UploadResponse {
                document: outcome.document,
                duplicate: outcome.was_duplicate,
            }),
        ));
    }

    Err(ApiError::BadRequest("No file in upload".into()))
}

/// GET /api/documents - list documents, newest first
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            DocumentStatus::from_str(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };
    let db = state.db.clone();
    let documents = blocking(move || db.list_documents(status, query.limit)).await?;
    Ok(Json(documents))
}

/// GET /api/documents/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentDetail>> {
    let db = state.db.clone();
    let detail = blocking(move || {
        let document = db.get_document(&id)?;
        let chunk_count = db.get_chunks_by_document(&id)?.len();
        Ok::<_, murag_db::DbError>(DocumentDetail {
            document,
            chunk_count,
        })
    })
    .await?;
    Ok(Json(detail))
}

/// DELETE /api/documents/:id - remove a document and everything derived from it
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DocumentDeletion>> {
    let ingestor = state.ingestor.clone();
    let deletion = blocking(move || ingestor.remove(&id)).await?;
    state.refresh_index().await;

    tracing::info!(
        "Deleted document '{}' ({} chunks)",
        deletion.document.filename,
        deletion.chunks_removed
    );
    Ok(Json(deletion))
}

/// POST /api/documents/:id/reprocess
pub async fn reprocess_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReprocessResponse>> {
    let ingestor = state.ingestor.clone();
    let document_id = id.clone();
    let queued = blocking(move || ingestor.reprocess(&document_id)).await?;
    state.refresh_index().await;
    Ok(Json(ReprocessResponse { id, queued }))
}
