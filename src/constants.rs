/// Application constants

// Chains
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const SEPOLIA_NAME: &str = "Sepolia";
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84_532;
pub const BASE_SEPOLIA_NAME: &str = "Base Sepolia";

// Default endpoints
pub const DEFAULT_SECONDARY_RPC_URL: &str = "https://sepolia.base.org";
pub const DEFAULT_PRICE_FEED_RPC_URL: &str = "https://sepolia.rpc.thirdweb.com";
pub const DEFAULT_BLOCKSCOUT_SEPOLIA_URL: &str = "https://eth-sepolia.blockscout.com/api";
pub const DEFAULT_BLOCKSCOUT_BASE_SEPOLIA_URL: &str = "https://base-sepolia.blockscout.com/api";
pub const DEFAULT_CHAT_API_URL: &str = "https://api.asi1.ai/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "asi1-mini";

// Contract addresses (Sepolia)
pub const PYTH_SEPOLIA_ADDRESS: &str = "0x26DD80569a8B23768A1d80869Ed7339e07595E85";
pub const PYUSD_SEPOLIA_ADDRESS: &str = "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9";

// Pyth price identifiers
pub const PYTH_ETH_USD: &str = "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";
pub const PYTH_BTC_USD: &str = "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";
pub const PYTH_USDC_USD: &str = "0xeaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a";
// PYUSD is valued off the USDC feed.
pub const PYTH_PYUSD_USD: &str = PYTH_USDC_USD;

/// Symbol -> price identifier, in the order prices are requested.
pub const PRICE_FEEDS: [(&str, &str); 4] = [
    ("ETH", PYTH_ETH_USD),
    ("BTC", PYTH_BTC_USD),
    ("USDC", PYTH_USDC_USD),
    ("PYUSD", PYTH_PYUSD_USD),
];

/// Prices used when the oracle returns nothing usable.
pub const FALLBACK_PRICES_USD: [(&str, f64); 4] = [
    ("ETH", 2_500.0),
    ("BTC", 65_000.0),
    ("USDC", 1.0),
    ("PYUSD", 1.0),
];

pub const PRICE_FRESHNESS_SECS: i64 = 60;

// Balances
pub const BALANCE_EPSILON: f64 = 0.000_000_1;
pub const TOKEN_DISPLAY_DECIMALS: u32 = 6;
pub const NATIVE_SYMBOL: &str = "ETH";

// Stablecoin
pub const PYUSD_SYMBOL: &str = "PYUSD";
pub const PYUSD_DECIMALS: u32 = 6;

// Cashback, in basis points of the transfer amount
pub const CASHBACK_MIN_BPS: f64 = 10.0;
pub const CASHBACK_SPAN_BPS: f64 = 40.0;
pub const CASHBACK_DECIMALS: u32 = 6;

pub const SIMULATED_TX_REF: &str = "simulated";

// API version
pub const API_VERSION: &str = "v1";

// Store event channel
pub const STORE_EVENT_CAPACITY: usize = 100;

/// Background balance refresh period while a wallet is connected
pub const BALANCE_REFRESH_INTERVAL_SECS: u64 = 60;

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
