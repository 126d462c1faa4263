use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;
mod utils;
mod websocket;

use config::Config;
use constants::API_VERSION;
use integrations::{BlockscoutClient, ChatClient, PythPriceFeed, PyusdToken, StablecoinTransfer};
use models::ChainKey;
use services::{
    chain::RpcChainProvider, AssistantService, ThreadCashbackRng, TransferFlow, WalletConnector,
    WalletStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting wallet dashboard");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Read-side clients shared by every session
    let secondary_chain =
        RpcChainProvider::read_only(&config.secondary_rpc_url, ChainKey::BaseSepolia)?;
    let store = Arc::new(WalletStore::new(
        Arc::new(BlockscoutClient::from_config(&config)),
        PythPriceFeed::from_config(&config)?,
        Arc::new(secondary_chain),
    ));

    // Cashback payouts are disabled without a treasury signer
    let treasury: Option<Arc<dyn StablecoinTransfer>> = match PyusdToken::treasury(&config) {
        Ok(token) => Some(Arc::new(token)),
        Err(e) => {
            tracing::warn!("Cashback disabled: {}", e);
            None
        }
    };

    let app_state = api::AppState {
        config: config.clone(),
        store: store.clone(),
        connector: Arc::new(WalletConnector::from_config(&config)?),
        transfer_flow: Arc::new(Mutex::new(TransferFlow::new(
            treasury,
            Box::new(ThreadCashbackRng),
        ))),
        assistant: Arc::new(AssistantService::new(ChatClient::from_config(&config))),
    };

    // Build router
    let app = build_router(app_state);

    // Start background services
    services::start_background_services(store);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Wallet session
        .route("/api/v1/wallet/connect", post(api::wallet::connect))
        .route("/api/v1/wallet/disconnect", post(api::wallet::disconnect))
        .route("/api/v1/wallet/refresh", post(api::wallet::refresh))
        .route("/api/v1/wallet/snapshot", get(api::wallet::get_snapshot))
        .route("/api/v1/wallet/portfolio", get(api::wallet::get_portfolio))
        .route(
            "/api/v1/wallet/pyusd-balance",
            get(api::wallet::get_pyusd_balance),
        )
        // Transactions
        .route(
            "/api/v1/transactions/history",
            get(api::transactions::get_history),
        )
        // Transfer dialog
        .route("/api/v1/transfer/simulate", post(api::transfer::simulate))
        .route("/api/v1/transfer/execute", post(api::transfer::execute))
        .route("/api/v1/transfer/reset", post(api::transfer::reset))
        .route("/api/v1/transfer/state", get(api::transfer::get_state))
        // AI
        .route("/api/v1/ai/chat", post(api::ai::chat))
        // WebSocket
        .route("/ws/wallet", get(websocket::wallet::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let Some(allowed) = parse_allowed_origins(&config.cors_allowed_origins) else {
        tracing::info!("CORS: any origin allowed");
        return CorsLayer::very_permissive();
    };

    if allowed.is_empty() {
        tracing::warn!(
            "No valid CORS origins in {:?}; falling back to permissive",
            config.cors_allowed_origins
        );
        return CorsLayer::very_permissive();
    }

    tracing::info!("CORS: {} allowed origin(s): {:?}", allowed.len(), allowed);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// `None` means any origin (blank or `*`); otherwise the origins that parse as
/// header values, with unparseable entries logged and skipped.
fn parse_allowed_origins(raw: &str) -> Option<Vec<HeaderValue>> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "*" {
        return None;
    }

    let origins = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    Some(origins)
}
