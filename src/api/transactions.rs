use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::{ApiResponse, Transaction, TransactionKind},
};

use super::AppState;

const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub tx_type: Option<String>,
    pub limit: Option<usize>,
}

// Internal helper that parses the optional `tx_type` filter.
fn parse_kind(raw: Option<&str>) -> Result<Option<TransactionKind>> {
    match raw.map(|value| value.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(value) if value.is_empty() || value == "all" => Ok(None),
        Some(value) if value == "transfer" => Ok(Some(TransactionKind::Transfer)),
        Some(value) if value == "cashback" => Ok(Some(TransactionKind::Cashback)),
        Some(value) => Err(AppError::BadRequest(format!("Unknown tx_type: {}", value))),
    }
}

fn filter_history(
    history: Vec<Transaction>,
    kind: Option<TransactionKind>,
    limit: Option<usize>,
) -> Vec<Transaction> {
    let limit = limit.unwrap_or(MAX_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
    history
        .into_iter()
        .filter(|tx| kind.map(|kind| tx.kind == kind).unwrap_or(true))
        .take(limit)
        .collect()
}

/// GET /api/v1/transactions/history
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<Transaction>>>> {
    let kind = parse_kind(query.tx_type.as_deref())?;
    let history = state.store.history().await;
    Ok(Json(ApiResponse::success(filter_history(
        history,
        kind,
        query.limit,
    ))))
}
