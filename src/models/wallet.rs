use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    BASE_SEPOLIA_CHAIN_ID, BASE_SEPOLIA_NAME, SEPOLIA_CHAIN_ID, SEPOLIA_NAME,
};

/// Chains the dashboard knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKey {
    Sepolia,
    BaseSepolia,
}

impl ChainKey {
    pub fn all() -> [ChainKey; 2] {
        [ChainKey::Sepolia, ChainKey::BaseSepolia]
    }

    pub fn chain_id(self) -> u64 {
        match self {
            ChainKey::Sepolia => SEPOLIA_CHAIN_ID,
            ChainKey::BaseSepolia => BASE_SEPOLIA_CHAIN_ID,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChainKey::Sepolia => SEPOLIA_NAME,
            ChainKey::BaseSepolia => BASE_SEPOLIA_NAME,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|chain| chain.chain_id() == chain_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRef {
    pub name: String,
    pub id: u64,
}

impl From<ChainKey> for ChainRef {
    fn from(chain: ChainKey) -> Self {
        Self {
            name: chain.name().to_string(),
            id: chain.chain_id(),
        }
    }
}

/// Everything the UI renders about the connected wallet.
///
/// `balances_by_chain` only ever holds entries above the dust threshold;
/// the unfiltered explorer output is kept in `raw_balances_by_chain`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub address: Option<String>,
    pub connected: bool,
    pub balances_by_chain: BTreeMap<u64, BTreeMap<String, String>>,
    pub raw_balances_by_chain: BTreeMap<u64, BTreeMap<String, String>>,
    pub native_balance_by_chain: BTreeMap<u64, String>,
    pub prices_usd: BTreeMap<String, f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WalletSnapshot {
    pub fn balances_on(&self, chain: ChainKey) -> Option<&BTreeMap<String, String>> {
        self.balances_by_chain.get(&chain.chain_id())
    }

    pub fn native_balance_on(&self, chain: ChainKey) -> Option<&str> {
        self.native_balance_by_chain
            .get(&chain.chain_id())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Cashback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub token_symbol: String,
    pub source_chain: ChainRef,
    pub destination_chain: ChainRef,
    pub amount: String,
    pub receiver: String,
    pub external_tx_reference: String,
    pub created_at: DateTime<Utc>,
}

/// A transaction before the store stamps it with an id and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub token_symbol: String,
    pub source_chain: ChainRef,
    pub destination_chain: ChainRef,
    pub amount: String,
    pub receiver: String,
    pub external_tx_reference: String,
}

impl NewTransaction {
    pub fn into_transaction(self, id: String, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            token_symbol: self.token_symbol,
            source_chain: self.source_chain,
            destination_chain: self.destination_chain,
            amount: self.amount,
            receiver: self.receiver,
            external_tx_reference: self.external_tx_reference,
            created_at,
        }
    }
}

/// Raw input of the transfer dialog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub recipient: String,
}

impl TransferForm {
    pub fn is_complete(&self) -> bool {
        [&self.token, &self.amount, &self.chain_id, &self.recipient]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub token_symbol: String,
    pub source_chain: ChainRef,
    pub destination_chain: ChainRef,
    pub requested_chain_id: String,
    pub amount: String,
    pub receiver: String,
    pub external_tx_reference: String,
}

/// Decoded oracle price. A failed read is represented by `PriceData::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub price: f64,
    pub confidence: f64,
    pub exponent: i32,
    pub published_at: i64,
    pub is_fresh: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_key_round_trips_through_id() {
        assert_eq!(ChainKey::from_chain_id(84_532), Some(ChainKey::BaseSepolia));
        assert_eq!(ChainKey::from_chain_id(1), None);
    }

    #[test]
    fn default_snapshot_is_disconnected_and_empty() {
        let snapshot = WalletSnapshot::default();
        assert!(!snapshot.connected);
        assert!(snapshot.address.is_none());
        assert!(snapshot.balances_by_chain.is_empty());
        assert!(snapshot.prices_usd.is_empty());
    }

    #[test]
    fn transfer_form_requires_every_field() {
        let mut form = TransferForm {
            token: "ETH".to_string(),
            amount: "1.0".to_string(),
            chain_id: "84532".to_string(),
            recipient: "0xabc".to_string(),
        };
        assert!(form.is_complete());
        form.recipient = "   ".to_string();
        assert!(!form.is_complete());
    }

    #[test]
    fn transaction_kind_serializes_lowercase() {
        let json = serde_json::to_string(&TransactionKind::Cashback).unwrap();
        assert_eq!(json, "\"cashback\"");
    }
}
