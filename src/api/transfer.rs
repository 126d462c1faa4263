use axum::{extract::State, Json};

use crate::{
    error::{AppError, Result},
    models::{ApiResponse, SimulationResult, TransferForm},
    services::transfer_flow::{FlowState, TransferOutcome},
};

use super::{require_connected, AppState};

/// POST /api/v1/transfer/simulate
///
/// Incomplete forms are ignored and answered with `data: null`.
pub async fn simulate(
    State(state): State<AppState>,
    Json(form): Json<TransferForm>,
) -> Result<Json<ApiResponse<Option<SimulationResult>>>> {
    let mut flow = state
        .transfer_flow
        .try_lock()
        .map_err(|_| AppError::TransferInProgress)?;
    Ok(Json(ApiResponse::success(flow.simulate(&form))))
}

/// POST /api/v1/transfer/execute
pub async fn execute(State(state): State<AppState>) -> Result<Json<ApiResponse<TransferOutcome>>> {
    require_connected(&state).await?;
    let mut flow = state
        .transfer_flow
        .try_lock()
        .map_err(|_| AppError::TransferInProgress)?;

    let outcome = flow.execute(&state.store).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/transfer/reset
pub async fn reset(State(state): State<AppState>) -> Result<Json<ApiResponse<FlowState>>> {
    let mut flow = state
        .transfer_flow
        .try_lock()
        .map_err(|_| AppError::TransferInProgress)?;
    flow.reset();
    Ok(Json(ApiResponse::success(flow.state().clone())))
}

/// GET /api/v1/transfer/state
pub async fn get_state(State(state): State<AppState>) -> Result<Json<ApiResponse<FlowState>>> {
    let flow = state
        .transfer_flow
        .try_lock()
        .map_err(|_| AppError::TransferInProgress)?;
    Ok(Json(ApiResponse::success(flow.state().clone())))
}
