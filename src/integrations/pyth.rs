use async_trait::async_trait;
use ethers::{
    providers::{Http, Provider},
    types::{Address, U256},
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    constants::PRICE_FRESHNESS_SECS,
    error::{AppError, Result},
    models::PriceData,
};

ethers::contract::abigen!(
    IPyth,
    r#"[
        function getPriceUnsafe(bytes32 id) view returns (int64 price, uint64 conf, int32 expo, uint256 publishTime)
    ]"#
);

/// Undecoded `getPriceUnsafe` output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrice {
    pub price: i64,
    pub conf: u64,
    pub expo: i32,
    pub publish_time: U256,
}

#[async_trait]
pub trait PriceReader: Send + Sync {
    async fn get_price_unsafe(&self, price_id: [u8; 32]) -> Result<RawPrice>;
}

/// Reads the Pyth contract over a dedicated JSON-RPC endpoint.
pub struct EthersPriceReader {
    contract: IPyth<Provider<Http>>,
}

impl EthersPriceReader {
    pub fn new(rpc_url: &str, contract_address: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AppError::Internal(format!("Invalid price feed RPC URL: {}", e)))?;
        let address = Address::from_str(contract_address)
            .map_err(|_| AppError::InvalidAddress(contract_address.to_string()))?;
        Ok(Self {
            contract: IPyth::new(address, Arc::new(provider)),
        })
    }
}

#[async_trait]
impl PriceReader for EthersPriceReader {
    async fn get_price_unsafe(&self, price_id: [u8; 32]) -> Result<RawPrice> {
        let (price, conf, expo, publish_time) = self
            .contract
            .get_price_unsafe(price_id)
            .call()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(RawPrice {
            price,
            conf,
            expo,
            publish_time,
        })
    }
}

/// Price oracle client over any [`PriceReader`].
#[derive(Clone)]
pub struct PythPriceFeed {
    reader: Arc<dyn PriceReader>,
}

impl PythPriceFeed {
    pub fn new(reader: Arc<dyn PriceReader>) -> Self {
        Self { reader }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let reader = EthersPriceReader::new(&config.price_feed_rpc_url, &config.pyth_contract_address)?;
        Ok(Self::new(Arc::new(reader)))
    }

    /// Reads one feed. Any failure yields a zeroed, stale `PriceData`.
    pub async fn get_price(&self, price_id: &str) -> PriceData {
        let raw = match parse_price_id(price_id) {
            Ok(id) => self.reader.get_price_unsafe(id).await,
            Err(e) => Err(e),
        };
        match raw {
            Ok(raw) => decode_price(raw, chrono::Utc::now().timestamp()),
            Err(e) => {
                tracing::error!("[Pyth] Failed to fetch price for {}: {}", price_id, e);
                PriceData::default()
            }
        }
    }

    /// Reads feeds one after another; a failing id does not affect the others.
    pub async fn get_multiple_prices(&self, price_ids: &[&str]) -> HashMap<String, PriceData> {
        let mut prices = HashMap::with_capacity(price_ids.len());
        for id in price_ids {
            let price = self.get_price(id).await;
            prices.insert(id.to_string(), price);
        }
        prices
    }
}

pub fn parse_price_id(price_id: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(price_id.trim().trim_start_matches("0x"))
        .map_err(|e| AppError::BadRequest(format!("Invalid price id {}: {}", price_id, e)))?;
    bytes
        .try_into()
        .map_err(|_| AppError::BadRequest(format!("Price id {} is not 32 bytes", price_id)))
}

/// Applies the exponent to price and confidence and stamps freshness against `now`.
pub fn decode_price(raw: RawPrice, now: i64) -> PriceData {
    let scale = 10f64.powi(raw.expo);
    let published_at = if raw.publish_time > U256::from(i64::MAX as u64) {
        i64::MAX
    } else {
        raw.publish_time.as_u64() as i64
    };
    PriceData {
        price: raw.price as f64 * scale,
        confidence: raw.conf as f64 * scale,
        exponent: raw.expo,
        published_at,
        is_fresh: now.saturating_sub(published_at) < PRICE_FRESHNESS_SECS,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::{PYTH_BTC_USD, PYTH_ETH_USD, PYTH_PYUSD_USD, PYTH_USDC_USD};
    use std::collections::HashMap;

    /// Serves fixed raw prices keyed by id; ids listed in `failing` error out.
    pub(crate) struct FakePriceReader {
        pub prices: HashMap<[u8; 32], RawPrice>,
        pub failing: Vec<[u8; 32]>,
    }

    #[async_trait]
    impl PriceReader for FakePriceReader {
        async fn get_price_unsafe(&self, price_id: [u8; 32]) -> Result<RawPrice> {
            if self.failing.contains(&price_id) {
                return Err(AppError::BlockchainRPC("execution reverted".to_string()));
            }
            self.prices
                .get(&price_id)
                .copied()
                .ok_or_else(|| AppError::NotFound("price feed".to_string()))
        }
    }

    pub(crate) fn raw(price: i64, expo: i32) -> RawPrice {
        RawPrice {
            price,
            conf: 150_000,
            expo,
            publish_time: U256::from(chrono::Utc::now().timestamp() as u64),
        }
    }

    #[test]
    fn decode_price_applies_exponent() {
        let decoded = decode_price(
            RawPrice {
                price: 250_012_345_678,
                conf: 123_456_789,
                expo: -8,
                publish_time: U256::from(1_000u64),
            },
            1_030,
        );
        assert!((decoded.price - 2500.12345678).abs() < 1e-6);
        assert!((decoded.confidence - 1.23456789).abs() < 1e-9);
        assert_eq!(decoded.exponent, -8);
        assert_eq!(decoded.published_at, 1_000);
        assert!(decoded.is_fresh);
    }

    #[test]
    fn decode_price_marks_old_prices_stale() {
        let decoded = decode_price(raw(100, 0), i64::MAX);
        assert!(!decoded.is_fresh);
        let at_limit = decode_price(
            RawPrice {
                publish_time: U256::from(1_000u64),
                ..raw(100, 0)
            },
            1_060,
        );
        assert!(!at_limit.is_fresh);
    }

    #[test]
    fn parse_price_id_rejects_short_ids() {
        assert!(parse_price_id("0x1234").is_err());
        assert!(parse_price_id(PYTH_ETH_USD).is_ok());
    }

    #[tokio::test]
    async fn get_price_returns_zeroed_result_on_read_failure() {
        let id = parse_price_id(PYTH_ETH_USD).unwrap();
        let feed = PythPriceFeed::new(Arc::new(FakePriceReader {
            prices: HashMap::new(),
            failing: vec![id],
        }));
        assert_eq!(feed.get_price(PYTH_ETH_USD).await, PriceData::default());
    }

    #[tokio::test]
    async fn get_multiple_prices_isolates_one_failure() {
        let eth = parse_price_id(PYTH_ETH_USD).unwrap();
        let btc = parse_price_id(PYTH_BTC_USD).unwrap();
        let usdc = parse_price_id(PYTH_USDC_USD).unwrap();
        let bad = "0x".to_string() + &"ab".repeat(32);
        let mut prices = HashMap::new();
        prices.insert(eth, raw(250_000_000_000, -8));
        prices.insert(btc, raw(6_500_000_000_000, -8));
        prices.insert(usdc, raw(100_000_000, -8));
        let feed = PythPriceFeed::new(Arc::new(FakePriceReader {
            prices,
            failing: vec![parse_price_id(&bad).unwrap()],
        }));

        let result = feed
            .get_multiple_prices(&[PYTH_ETH_USD, PYTH_BTC_USD, PYTH_USDC_USD, bad.as_str()])
            .await;

        assert_eq!(result.len(), 4);
        assert!((result[PYTH_ETH_USD].price - 2500.0).abs() < 1e-6);
        assert!((result[PYTH_BTC_USD].price - 65_000.0).abs() < 1e-6);
        assert!((result[PYTH_USDC_USD].price - 1.0).abs() < 1e-9);
        assert!(result[PYTH_USDC_USD].is_fresh);
        assert_eq!(result[bad.as_str()], PriceData::default());
        assert_eq!(PYTH_PYUSD_USD, PYTH_USDC_USD);
    }
}
