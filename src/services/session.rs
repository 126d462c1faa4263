use ethers::signers::{LocalWallet, Signer};
use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, Result},
    integrations::{PyusdToken, StablecoinTransfer},
    models::ChainKey,
    services::chain::{ChainProvider, RpcChainProvider},
    utils::{checksum_address, parse_address},
};

/// Handles produced for one connected wallet.
pub struct WalletSession {
    pub address: String,
    pub provider: Arc<dyn ChainProvider>,
    pub stablecoin: Arc<dyn StablecoinTransfer>,
    pub can_sign: bool,
}

/// Opens Sepolia sessions for wallet addresses. When the configured local key
/// owns the address the session can sign; any other address is watch-only.
pub struct WalletConnector {
    primary_rpc_url: String,
    pyusd_contract_address: String,
    wallet: Option<LocalWallet>,
}

impl WalletConnector {
    pub fn from_config(config: &Config) -> Result<Self> {
        let wallet = match config.wallet_private_key.as_deref() {
            Some(key) => {
                let wallet = key
                    .parse::<LocalWallet>()
                    .map_err(|e| AppError::Internal(format!("Invalid wallet key: {}", e)))?;
                tracing::info!("Local signer available for {:#x}", wallet.address());
                Some(wallet)
            }
            None => None,
        };
        Ok(Self {
            primary_rpc_url: config.primary_rpc_url.clone(),
            pyusd_contract_address: config.pyusd_contract_address.clone(),
            wallet,
        })
    }

    pub fn signer_address(&self) -> Option<String> {
        self.wallet
            .as_ref()
            .map(|wallet| ethers::utils::to_checksum(&wallet.address(), None))
    }

    pub fn connect(&self, address: &str) -> Result<WalletSession> {
        let parsed = parse_address(address)?;
        let address = checksum_address(address)?;

        match self.wallet.as_ref().filter(|wallet| wallet.address() == parsed) {
            Some(wallet) => {
                let provider = RpcChainProvider::with_signer(
                    &self.primary_rpc_url,
                    ChainKey::Sepolia,
                    wallet.clone(),
                )?;
                let client = provider
                    .signer_client()
                    .ok_or_else(|| AppError::SignerUnavailable(ChainKey::Sepolia.name().to_string()))?;
                let stablecoin = PyusdToken::new(&self.pyusd_contract_address, client)?;
                Ok(WalletSession {
                    address,
                    provider: Arc::new(provider),
                    stablecoin: Arc::new(stablecoin),
                    can_sign: true,
                })
            }
            None => {
                tracing::warn!("No local signer for {}; session is watch-only", address);
                let provider = RpcChainProvider::read_only(&self.primary_rpc_url, ChainKey::Sepolia)?;
                let stablecoin = PyusdToken::new(&self.pyusd_contract_address, provider.http())?;
                Ok(WalletSession {
                    address,
                    provider: Arc::new(provider),
                    stablecoin: Arc::new(stablecoin),
                    can_sign: false,
                })
            }
        }
    }
}
