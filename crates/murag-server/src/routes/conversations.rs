//! Conversations and question answering.

use crate::error::{blocking, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use murag_core::{Conversation, Message};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversation {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ExchangeResponse {
    pub user: Message,
    pub assistant: Message,
    pub implicit_citation: bool,
}

/// POST /api/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    body: Option<Json<CreateConversation>>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let Json(body) = body.unwrap_or_default();
    let conversations = state.conversations.clone();
    let conversation = blocking(move || conversations.start(body.title.as_deref())).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    let conversations = state.conversations.clone();
    Ok(Json(blocking(move || conversations.list(query.limit)).await?))
}

/// GET /api/conversations/:id/messages
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let conversations = state.conversations.clone();
    Ok(Json(blocking(move || conversations.history(&id)).await?))
}

/// POST /api/conversations/:id/messages - ask a question
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PostMessage>,
) -> ApiResult<Json<ExchangeResponse>> {
    let exchange = state.conversations.submit(&id, &body.content).await?;
    Ok(Json(ExchangeResponse {
        user: exchange.user,
        assistant: exchange.assistant,
        implicit_citation: exchange.implicit_citation,
    }))
}
