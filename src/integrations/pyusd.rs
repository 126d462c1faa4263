use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::Address,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    constants::{PYUSD_DECIMALS, SEPOLIA_CHAIN_ID},
    error::{AppError, Result},
    services::chain::{http_provider, SignerClient},
    utils::{parse_address, to_base_units},
};

ethers::contract::abigen!(
    Pyusd,
    r#"[
        function balanceOf(address account) view returns (uint256)
        function transfer(address to, uint256 amount) returns (bool)
        function approve(address spender, uint256 amount) returns (bool)
        function transferFrom(address from, address to, uint256 amount) returns (bool)
    ]"#
);

/// Handle of a submitted (not yet confirmed) token transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxHandle {
    pub hash: String,
}

/// Minimal stablecoin surface used by wallet sessions and cashback payouts.
#[async_trait]
pub trait StablecoinTransfer: Send + Sync {
    async fn transfer(&self, to: &str, amount: &str) -> Result<TxHandle>;
    async fn approve(&self, spender: &str, amount: &str) -> Result<TxHandle>;

    /// Token balance of `account` as a 6-decimal string.
    async fn balance_of(&self, account: &str) -> Result<String>;
}

/// PYUSD bound to whichever middleware signs for it.
pub struct PyusdToken<M> {
    contract: Pyusd<M>,
}

impl<M: Middleware + 'static> PyusdToken<M> {
    pub fn new(contract_address: &str, client: Arc<M>) -> Result<Self> {
        let address = Address::from_str(contract_address)
            .map_err(|_| AppError::InvalidAddress(contract_address.to_string()))?;
        Ok(Self {
            contract: Pyusd::new(address, client),
        })
    }
}

impl PyusdToken<SignerClient> {
    /// Instance signed by the treasury key that funds cashback.
    pub fn treasury(config: &Config) -> Result<Self> {
        let key = config
            .treasury_private_key
            .as_deref()
            .ok_or_else(|| AppError::SignerUnavailable("treasury".to_string()))?;
        let wallet = key
            .parse::<LocalWallet>()
            .map_err(|e| AppError::Internal(format!("Invalid treasury key: {}", e)))?
            .with_chain_id(SEPOLIA_CHAIN_ID);
        tracing::info!("Treasury signer loaded: {:#x}", wallet.address());
        let client = SignerMiddleware::new(http_provider(&config.primary_rpc_url)?, wallet);
        Self::new(&config.pyusd_contract_address, Arc::new(client))
    }
}

fn handle_for(hash: ethers::types::TxHash) -> TxHandle {
    let handle = TxHandle {
        hash: format!("{:#x}", hash),
    };
    tracing::info!("[PYUSD] Tx hash: {}", handle.hash);
    handle
}

#[async_trait]
impl<M: Middleware + 'static> StablecoinTransfer for PyusdToken<M> {
    async fn transfer(&self, to: &str, amount: &str) -> Result<TxHandle> {
        let to = parse_address(to)?;
        let value = to_base_units(amount, PYUSD_DECIMALS)?;
        let call = self.contract.transfer(to, value);
        let pending = call
            .send()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(handle_for(pending.tx_hash()))
    }

    async fn approve(&self, spender: &str, amount: &str) -> Result<TxHandle> {
        let spender = parse_address(spender)?;
        let value = to_base_units(amount, PYUSD_DECIMALS)?;
        let call = self.contract.approve(spender, value);
        let pending = call
            .send()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(handle_for(pending.tx_hash()))
    }

    async fn balance_of(&self, account: &str) -> Result<String> {
        let account = parse_address(account)?;
        let raw = self
            .contract
            .balance_of(account)
            .call()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        ethers::utils::format_units(raw, PYUSD_DECIMALS)
            .map_err(|e| AppError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn treasury_requires_configured_key() {
        let config = test_config();
        assert!(matches!(
            PyusdToken::treasury(&config),
            Err(AppError::SignerUnavailable(_))
        ));
    }

    #[test]
    fn treasury_rejects_malformed_key() {
        let mut config = test_config();
        config.treasury_private_key = Some("not-a-key".to_string());
        assert!(matches!(
            PyusdToken::treasury(&config),
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn transfer_rejects_invalid_amount_before_rpc() {
        let provider = http_provider("http://127.0.0.1:1").unwrap();
        let token = PyusdToken::new(
            "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9",
            Arc::new(provider),
        )
        .unwrap();
        let err = token
            .transfer("0x1111111111111111111111111111111111111111", "-5")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn balance_of_validates_account_before_rpc() {
        let provider = http_provider("http://127.0.0.1:1").unwrap();
        let token = PyusdToken::new(
            "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9",
            Arc::new(provider),
        )
        .unwrap();
        assert!(matches!(
            token.balance_of("nope").await,
            Err(AppError::InvalidAddress(_))
        ));
    }
}
