// src/api/mod.rs

pub mod ai;
pub mod health;
pub mod transactions;
pub mod transfer;
pub mod wallet;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::{AssistantService, TransferFlow, WalletConnector, WalletStore};

// AppState definition
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<WalletStore>,
    pub connector: Arc<WalletConnector>,
    pub transfer_flow: Arc<Mutex<TransferFlow>>,
    pub assistant: Arc<AssistantService>,
}

/// Fails with `WalletNotConnected` unless a wallet session is open.
pub async fn require_connected(state: &AppState) -> Result<String> {
    let snapshot = state.store.snapshot().await;
    match snapshot.address {
        Some(address) if snapshot.connected => Ok(address),
        _ => Err(AppError::WalletNotConnected),
    }
}
