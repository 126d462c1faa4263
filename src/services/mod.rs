// All service modules
pub mod assistant;
pub mod chain;
pub mod portfolio;
pub mod session;
pub mod transfer_flow;
pub mod wallet_store;

// Re-export for convenience
pub use assistant::AssistantService;
pub use session::WalletConnector;
pub use transfer_flow::{ThreadCashbackRng, TransferFlow};
pub use wallet_store::{RefreshOutcome, StoreEvent, WalletStore};

use crate::constants::BALANCE_REFRESH_INTERVAL_SECS;
use std::sync::Arc;

/// Start all background services
pub fn start_background_services(store: Arc<WalletStore>) {
    tracing::info!("Starting background services...");

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(BALANCE_REFRESH_INTERVAL_SECS)).await;

            if store.is_connected().await {
                let outcome = store.update_balances().await;
                tracing::debug!("Periodic balance refresh: {:?}", outcome);
            }
        }
    });

    tracing::info!("All background services started successfully");
}
