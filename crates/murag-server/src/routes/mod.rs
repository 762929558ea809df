//! API routes, nested under `/api`.

pub mod citations;
pub mod conversations;
pub mod documents;
pub mod jobs;
pub mod metrics;

use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// Multipart framing allowance on top of the upload size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/documents",
            post(documents::upload_document)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD))
                .get(documents::list_documents),
        )
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/reprocess", post(documents::reprocess_document))
        .route("/jobs", get(jobs::list_jobs))
        .route(
            "/conversations",
            post(conversations::create_conversation).get(conversations::list_conversations),
        )
        .route(
            "/conversations/:id/messages",
            get(conversations::get_messages).post(conversations::post_message),
        )
        .route("/citations/:id", get(citations::get_citation))
        .route("/metrics", get(metrics::get_metrics))
}
