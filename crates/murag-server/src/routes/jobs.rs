//! Pipeline job queue inspection.

use crate::error::{blocking, ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use murag_core::{Job, JobStatus};
use murag_db::JobCounts;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<Job>,
    pub counts: JobCounts,
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> ApiResult<Json<JobsResponse>> {
    let status = match query.status.as_deref() {
        Some(s) => Some(
            JobStatus::from_str(s)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown job status: {}", s)))?,
        ),
        None => None,
    };

    let db = state.db.clone();
    let response = blocking(move || {
        Ok::<_, murag_db::DbError>(JobsResponse {
            jobs: db.list_jobs(status, query.limit)?,
            counts: db.job_counts()?,
        })
    })
    .await?;
    Ok(Json(response))
}
