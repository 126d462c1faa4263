use async_trait::async_trait;
use ethers::types::U256;
use reqwest::Client;
use std::collections::HashMap;
use url::Url;

use crate::{
    config::Config,
    constants::TOKEN_DISPLAY_DECIMALS,
    error::{AppError, Result},
    models::ChainKey,
};

/// Source of per-chain ERC-20 holdings for an address.
///
/// Implementations never fail: an empty map means "unknown", not "zero".
#[async_trait]
pub trait TokenBalanceSource: Send + Sync {
    async fn fetch_balances(&self, address: &str, chain: ChainKey) -> HashMap<String, String>;
}

/// Blockscout `tokenlist` client, one explorer endpoint per chain.
#[derive(Clone, Debug)]
pub struct BlockscoutClient {
    client: Client,
    sepolia_url: String,
    base_sepolia_url: String,
}

impl BlockscoutClient {
    pub fn new(sepolia_url: String, base_sepolia_url: String) -> Self {
        Self {
            client: Client::new(),
            sepolia_url,
            base_sepolia_url,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.blockscout_sepolia_url.clone(),
            config.blockscout_base_sepolia_url.clone(),
        )
    }

    fn endpoint_for(&self, chain: ChainKey) -> &str {
        match chain {
            ChainKey::Sepolia => &self.sepolia_url,
            ChainKey::BaseSepolia => &self.base_sepolia_url,
        }
    }

    fn tokenlist_url(&self, address: &str, chain: ChainKey) -> Result<Url> {
        let mut url = Url::parse(self.endpoint_for(chain))
            .map_err(|e| AppError::Internal(format!("Invalid explorer URL for {:?}: {}", chain, e)))?;
        url.query_pairs_mut()
            .append_pair("module", "account")
            .append_pair("action", "tokenlist")
            .append_pair("address", address);
        Ok(url)
    }

    async fn request_tokenlist(&self, address: &str, chain: ChainKey) -> Result<serde_json::Value> {
        let url = self.tokenlist_url(address, chain)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "Blockscout API error for {}: {}",
                chain.name(),
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::ExternalAPI(e.to_string()))
    }
}

#[async_trait]
impl TokenBalanceSource for BlockscoutClient {
    async fn fetch_balances(&self, address: &str, chain: ChainKey) -> HashMap<String, String> {
        match self.request_tokenlist(address, chain).await {
            Ok(payload) => {
                let balances = parse_tokenlist(&payload, chain);
                tracing::debug!("[Balances:{}] Parsed balances: {:?}", chain.name(), balances);
                balances
            }
            Err(e) => {
                tracing::error!("[Balances:{}] Failed to fetch balances: {}", chain.name(), e);
                HashMap::new()
            }
        }
    }
}

// Internal helper that maps a tokenlist payload into symbol -> display balance.
fn parse_tokenlist(payload: &serde_json::Value, chain: ChainKey) -> HashMap<String, String> {
    let status = payload.get("status").and_then(|v| v.as_str());
    let tokens = match (status, payload.get("result").and_then(|v| v.as_array())) {
        (Some("1"), Some(tokens)) => tokens,
        _ => {
            tracing::warn!("[Balances:{}] Unexpected API format: {}", chain.name(), payload);
            return HashMap::new();
        }
    };

    let mut balances = HashMap::new();
    for token in tokens {
        let symbol = token
            .get("symbol")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("UNKNOWN");
        let decimals = token.get("decimals").and_then(json_as_u32).unwrap_or(0);
        let Some(raw) = token.get("balance").map_or(Some(U256::zero()), json_as_u256) else {
            tracing::warn!(
                "[Balances:{}] Skipping {} with unreadable balance",
                chain.name(),
                symbol
            );
            continue;
        };
        balances.insert(symbol.to_string(), format_token_amount(raw, decimals));
    }
    balances
}

// Internal helper that reads numbers the explorer may send as strings.
fn json_as_u32(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        serde_json::Value::String(s) if s.trim().is_empty() => Some(0),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Null => Some(0),
        _ => None,
    }
}

fn json_as_u256(value: &serde_json::Value) -> Option<U256> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        serde_json::Value::String(s) if s.trim().is_empty() => Some(U256::zero()),
        serde_json::Value::String(s) => U256::from_dec_str(s.trim()).ok(),
        serde_json::Value::Null => Some(U256::zero()),
        _ => None,
    }
}

/// Renders a raw integer amount with six rounded fractional digits, or the bare
/// integer when the token has no decimals.
pub fn format_token_amount(raw: U256, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let ten = U256::from(10u8);
    let display_scale = ten.pow(U256::from(TOKEN_DISPLAY_DECIMALS));
    let scaled = ten
        .checked_pow(U256::from(decimals))
        .and_then(|divisor| {
            raw.checked_mul(display_scale)
                .and_then(|v| v.checked_add(divisor / 2))
                .map(|v| v / divisor)
        });
    match scaled {
        Some(scaled) => format!(
            "{}.{:0width$}",
            scaled / display_scale,
            (scaled % display_scale).as_u64(),
            width = TOKEN_DISPLAY_DECIMALS as usize
        ),
        None => {
            // Out of U256 range for exact math; fall back to float rendering.
            let value = raw.to_string().parse::<f64>().unwrap_or(0.0) / 10f64.powi(decimals as i32);
            format!("{:.*}", TOKEN_DISPLAY_DECIMALS as usize, value)
        }
    }
}
