use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::{ApiResponse, WalletSnapshot},
    services::{portfolio::{build_portfolio, Portfolio}, RefreshOutcome},
};

use super::{require_connected, AppState};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub address: String,
    pub can_sign: bool,
    pub refresh: RefreshOutcome,
    pub snapshot: WalletSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StablecoinBalanceResponse {
    pub address: String,
    pub symbol: String,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub refresh: RefreshOutcome,
    pub snapshot: WalletSnapshot,
}

/// POST /api/v1/wallet/connect
pub async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ApiResponse<ConnectResponse>>> {
    let session = state.connector.connect(&req.address)?;
    let can_sign = session.can_sign;

    let refresh = state
        .store
        .set_wallet_data(session.address.clone(), session.provider, session.stablecoin)
        .await;
    // A fresh session starts with a fresh dialog.
    state.transfer_flow.lock().await.reset();

    Ok(Json(ApiResponse::success(ConnectResponse {
        address: session.address,
        can_sign,
        refresh,
        snapshot: state.store.snapshot().await,
    })))
}

/// POST /api/v1/wallet/disconnect
pub async fn disconnect(State(state): State<AppState>) -> Result<Json<ApiResponse<WalletSnapshot>>> {
    state.store.disconnect_wallet().await;
    state.transfer_flow.lock().await.reset();
    Ok(Json(ApiResponse::success(state.store.snapshot().await)))
}

/// POST /api/v1/wallet/refresh
pub async fn refresh(State(state): State<AppState>) -> Result<Json<ApiResponse<RefreshResponse>>> {
    require_connected(&state).await?;
    let refresh = state.store.update_balances().await;
    Ok(Json(ApiResponse::success(RefreshResponse {
        refresh,
        snapshot: state.store.snapshot().await,
    })))
}

/// GET /api/v1/wallet/snapshot
pub async fn get_snapshot(State(state): State<AppState>) -> Result<Json<ApiResponse<WalletSnapshot>>> {
    Ok(Json(ApiResponse::success(state.store.snapshot().await)))
}

/// GET /api/v1/wallet/portfolio
pub async fn get_portfolio(State(state): State<AppState>) -> Result<Json<ApiResponse<Portfolio>>> {
    require_connected(&state).await?;
    let snapshot = state.store.snapshot().await;
    let history = state.store.history().await;
    Ok(Json(ApiResponse::success(build_portfolio(&snapshot, &history))))
}

/// GET /api/v1/wallet/pyusd-balance
///
/// Reads PYUSD straight from the token contract on Sepolia, bypassing Blockscout.
pub async fn get_pyusd_balance(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StablecoinBalanceResponse>>> {
    let address = require_connected(&state).await?;
    let token = state
        .store
        .stablecoin()
        .await
        .ok_or(AppError::WalletNotConnected)?;
    let balance = token.balance_of(&address).await?;
    Ok(Json(ApiResponse::success(StablecoinBalanceResponse {
        address,
        symbol: "PYUSD".to_string(),
        balance,
    })))
}
