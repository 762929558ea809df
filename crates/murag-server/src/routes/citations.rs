//! Citation previews.

use crate::error::{blocking, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use murag_rag::CitationPreview;

/// GET /api/citations/:id
pub async fn get_citation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CitationPreview>> {
    let db = state.db.clone();
    Ok(Json(blocking(move || murag_rag::resolve(&db, &id)).await?))
}
