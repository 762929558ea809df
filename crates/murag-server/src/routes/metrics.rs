//! Dashboard metrics.

use crate::error::{blocking, ApiResult};
use crate::state::AppState;
use axum::{extract::State, Json};
use murag_core::DatabaseStats;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct IndexInfo {
    pub generation: u64,
    pub chunks: usize,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub stats: DatabaseStats,
    /// Valid citation markers over all markers emitted.
    pub citation_accuracy: Option<f64>,
    pub index: IndexInfo,
}

/// GET /api/metrics
pub async fn get_metrics(State(state): State<AppState>) -> ApiResult<Json<MetricsResponse>> {
    let db = state.db.clone();
    let stats = blocking(move || db.get_stats()).await?;
    let snapshot = state.snapshots.current();

    Ok(Json(MetricsResponse {
        citation_accuracy: stats.citation_accuracy(),
        stats,
        index: IndexInfo {
            generation: snapshot.generation(),
            chunks: snapshot.len(),
            dimensions: snapshot.dimensions(),
        },
    }))
}
