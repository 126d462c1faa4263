use serde::Deserialize;
use std::env;

use crate::constants::{
    DEFAULT_BLOCKSCOUT_BASE_SEPOLIA_URL, DEFAULT_BLOCKSCOUT_SEPOLIA_URL, DEFAULT_CHAT_API_URL,
    DEFAULT_CHAT_MODEL, DEFAULT_PRICE_FEED_RPC_URL, DEFAULT_SECONDARY_RPC_URL,
    PYTH_SEPOLIA_ADDRESS, PYUSD_SEPOLIA_ADDRESS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Chains
    pub primary_rpc_url: String,
    pub secondary_rpc_url: String,
    pub price_feed_rpc_url: String,

    // Explorers
    pub blockscout_sepolia_url: String,
    pub blockscout_base_sepolia_url: String,

    // Contract Addresses
    pub pyth_contract_address: String,
    pub pyusd_contract_address: String,

    // Signing
    pub wallet_private_key: Option<String>,
    pub treasury_private_key: Option<String>,

    // Chat assistant
    pub chat_api_url: String,
    pub chat_api_key: Option<String>,
    pub chat_model: String,

    // CORS
    pub cors_allowed_origins: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: var_or("HOST", "127.0.0.1"),
            port: var_or("PORT", "3000").parse()?,
            environment: var_or("ENVIRONMENT", "development"),

            primary_rpc_url: env::var("PRIMARY_RPC_URL")?,
            secondary_rpc_url: var_or("SECONDARY_RPC_URL", DEFAULT_SECONDARY_RPC_URL),
            price_feed_rpc_url: var_or("PRICE_FEED_RPC_URL", DEFAULT_PRICE_FEED_RPC_URL),

            blockscout_sepolia_url: var_or("BLOCKSCOUT_SEPOLIA_URL", DEFAULT_BLOCKSCOUT_SEPOLIA_URL),
            blockscout_base_sepolia_url: var_or(
                "BLOCKSCOUT_BASE_SEPOLIA_URL",
                DEFAULT_BLOCKSCOUT_BASE_SEPOLIA_URL,
            ),

            pyth_contract_address: var_or("PYTH_CONTRACT_ADDRESS", PYTH_SEPOLIA_ADDRESS),
            pyusd_contract_address: var_or("PYUSD_CONTRACT_ADDRESS", PYUSD_SEPOLIA_ADDRESS),

            wallet_private_key: optional_var("WALLET_PRIVATE_KEY"),
            treasury_private_key: optional_var("TREASURY_PRIVATE_KEY"),

            chat_api_url: var_or("CHAT_API_URL", DEFAULT_CHAT_API_URL),
            chat_api_key: optional_var("CHAT_API_KEY"),
            chat_model: var_or("CHAT_MODEL", DEFAULT_CHAT_MODEL),

            cors_allowed_origins: var_or("CORS_ALLOWED_ORIGINS", "*"),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.primary_rpc_url.trim().is_empty() {
            anyhow::bail!("PRIMARY_RPC_URL is empty");
        }
        if self.secondary_rpc_url.trim().is_empty() {
            anyhow::bail!("SECONDARY_RPC_URL is empty");
        }
        if self.price_feed_rpc_url.trim().is_empty() {
            anyhow::bail!("PRICE_FEED_RPC_URL is empty");
        }

        if self.wallet_private_key.is_none() {
            tracing::warn!("WALLET_PRIVATE_KEY not set; wallet sessions will be read-only");
        }
        if self.treasury_private_key.is_none() {
            tracing::warn!("TREASURY_PRIVATE_KEY not set; cashback payouts will fail");
        }
        if self.chat_api_key.is_none() {
            tracing::warn!("CHAT_API_KEY not set; chat assistant disabled");
        }
        if self.pyusd_contract_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder PYUSD contract address");
        }
        if self.pyth_contract_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder Pyth contract address");
        }
        if !self.is_testnet() && self.treasury_private_key.is_some() {
            tracing::warn!("Treasury key loaded outside a testnet environment");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        self.environment == "development" || self.environment == "testnet"
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "development".to_string(),
        primary_rpc_url: "http://127.0.0.1:8545".to_string(),
        secondary_rpc_url: "http://127.0.0.1:8546".to_string(),
        price_feed_rpc_url: "http://127.0.0.1:8547".to_string(),
        blockscout_sepolia_url: DEFAULT_BLOCKSCOUT_SEPOLIA_URL.to_string(),
        blockscout_base_sepolia_url: DEFAULT_BLOCKSCOUT_BASE_SEPOLIA_URL.to_string(),
        pyth_contract_address: PYTH_SEPOLIA_ADDRESS.to_string(),
        pyusd_contract_address: PYUSD_SEPOLIA_ADDRESS.to_string(),
        wallet_private_key: None,
        treasury_private_key: None,
        chat_api_url: DEFAULT_CHAT_API_URL.to_string(),
        chat_api_key: None,
        chat_model: DEFAULT_CHAT_MODEL.to_string(),
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_primary_rpc() {
        let mut config = test_config();
        config.primary_rpc_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_read_only_setup() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn production_is_not_testnet() {
        let mut config = test_config();
        config.environment = "production".to_string();
        assert!(!config.is_testnet());
    }
}
