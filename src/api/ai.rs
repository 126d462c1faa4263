use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{
    error::Result,
    models::ApiResponse,
    services::{assistant::AssistantReply, portfolio::build_portfolio},
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// POST /api/v1/ai/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ApiResponse<AssistantReply>>> {
    let snapshot = state.store.snapshot().await;
    let history = state.store.history().await;
    let portfolio = build_portfolio(&snapshot, &history);

    let reply = state.assistant.ask(&req.message, &portfolio).await?;
    Ok(Json(ApiResponse::success(reply)))
}
