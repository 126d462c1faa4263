use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{TransactionRequest, U64},
};
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    models::ChainKey,
    utils::{parse_address, to_base_units},
};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Native-asset access to one chain.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    fn chain(&self) -> ChainKey;

    /// Native balance of `address` as a decimal ether string.
    async fn native_balance(&self, address: &str) -> Result<String>;

    /// Sends `amount` ether to `to` and waits for the receipt. Returns the tx hash.
    async fn send_native(&self, to: &str, amount: &str) -> Result<String>;
}

/// JSON-RPC backed provider; sends require a local signer.
pub struct RpcChainProvider {
    chain: ChainKey,
    provider: Arc<Provider<Http>>,
    signer: Option<Arc<SignerClient>>,
}

pub fn http_provider(rpc_url: &str) -> Result<Provider<Http>> {
    Provider::<Http>::try_from(rpc_url)
        .map_err(|e| AppError::Internal(format!("Invalid EVM RPC URL {}: {}", rpc_url, e)))
}

impl RpcChainProvider {
    pub fn read_only(rpc_url: &str, chain: ChainKey) -> Result<Self> {
        Ok(Self {
            chain,
            provider: Arc::new(http_provider(rpc_url)?),
            signer: None,
        })
    }

    pub fn with_signer(rpc_url: &str, chain: ChainKey, wallet: LocalWallet) -> Result<Self> {
        let provider = http_provider(rpc_url)?;
        let wallet = wallet.with_chain_id(chain.chain_id());
        let signer = SignerMiddleware::new(provider.clone(), wallet);
        Ok(Self {
            chain,
            provider: Arc::new(provider),
            signer: Some(Arc::new(signer)),
        })
    }

    pub fn signer_client(&self) -> Option<Arc<SignerClient>> {
        self.signer.clone()
    }

    pub fn http(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }
}

#[async_trait]
impl ChainProvider for RpcChainProvider {
    fn chain(&self) -> ChainKey {
        self.chain
    }

    async fn native_balance(&self, address: &str) -> Result<String> {
        let addr = parse_address(address)?;
        let balance = self
            .provider
            .get_balance(addr, None)
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(ethers::utils::format_ether(balance))
    }

    async fn send_native(&self, to: &str, amount: &str) -> Result<String> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AppError::SignerUnavailable(self.chain.name().to_string()))?;
        let to = parse_address(to)?;
        let value = to_base_units(amount, 18)?;

        let request = TransactionRequest::new().to(to).value(value);
        let pending = signer
            .send_transaction(request, None)
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        let tx_hash = format!("{:#x}", pending.tx_hash());
        tracing::info!("Transaction sent on {}: {}", self.chain.name(), tx_hash);

        let receipt = pending
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .ok_or_else(|| AppError::BlockchainRPC(format!("Transaction {} dropped", tx_hash)))?;
        if receipt.status == Some(U64::zero()) {
            return Err(AppError::BlockchainRPC(format!("Transaction {} reverted", tx_hash)));
        }
        tracing::info!(
            "Transaction confirmed: {} (block {:?})",
            tx_hash,
            receipt.block_number
        );
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_provider_rejects_bad_url() {
        assert!(RpcChainProvider::read_only("not a url", ChainKey::Sepolia).is_err());
    }

    #[tokio::test]
    async fn read_only_provider_cannot_send() {
        let provider = RpcChainProvider::read_only("http://127.0.0.1:1", ChainKey::Sepolia).unwrap();
        let err = provider
            .send_native("0x1111111111111111111111111111111111111111", "1.0")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SignerUnavailable(_)));
    }

    #[test]
    fn signer_provider_is_bound_to_chain_id() {
        let wallet: LocalWallet = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
            .parse()
            .unwrap();
        let provider =
            RpcChainProvider::with_signer("http://127.0.0.1:8545", ChainKey::Sepolia, wallet).unwrap();
        let client = provider.signer_client().unwrap();
        assert_eq!(client.signer().chain_id(), 11_155_111);
    }
}
