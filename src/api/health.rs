use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub wallet: String,
    pub treasury: String,
    pub assistant: String,
    /// Address the local key signs for; other addresses connect watch-only.
    pub local_signer: Option<String>,
}

fn label(ok: bool, yes: &str, no: &str) -> String {
    let value = if ok { yes } else { no };
    value.to_string()
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.store.is_connected().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        wallet: label(connected, "connected", "disconnected"),
        treasury: label(
            state.config.treasury_private_key.is_some(),
            "configured",
            "missing",
        ),
        assistant: label(state.assistant.is_configured(), "configured", "missing"),
        local_signer: state.connector.signer_address(),
    })
}
