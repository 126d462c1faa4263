use serde::Serialize;

use crate::{
    constants::NATIVE_SYMBOL,
    models::{ChainKey, Transaction, TransactionKind, WalletSnapshot},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioAsset {
    pub token: String,
    pub network: String,
    pub chain_id: u64,
    pub balance: String,
    pub value_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    pub address: Option<String>,
    pub assets: Vec<PortfolioAsset>,
    pub total_value_usd: f64,
    pub cashback_earned: f64,
}

/// Values every holding in `snapshot` at its USD price. Holdings without a
/// price, or worth nothing, are left out.
pub fn build_portfolio(snapshot: &WalletSnapshot, history: &[Transaction]) -> Portfolio {
    let price_of = |symbol: &str| snapshot.prices_usd.get(symbol).copied().unwrap_or(0.0);

    let mut assets = Vec::new();
    for chain in ChainKey::all() {
        if let Some(balances) = snapshot.balances_on(chain) {
            for (token, balance) in balances {
                assets.push(asset(chain, token, balance, price_of(token)));
            }
        }
    }
    for chain in ChainKey::all() {
        if let Some(balance) = snapshot.native_balance_on(chain) {
            if parse_amount(balance) > 0.0 {
                assets.push(asset(chain, NATIVE_SYMBOL, balance, price_of(NATIVE_SYMBOL)));
            }
        }
    }
    assets.retain(|asset| asset.value_usd > 0.0);

    let total_value_usd = assets.iter().map(|asset| asset.value_usd).sum();
    Portfolio {
        address: snapshot.address.clone(),
        assets,
        total_value_usd,
        cashback_earned: cashback_earned(history),
    }
}

/// Sum of every recorded cashback amount.
pub fn cashback_earned(history: &[Transaction]) -> f64 {
    history
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Cashback)
        .map(|tx| parse_amount(&tx.amount))
        .sum()
}

fn asset(chain: ChainKey, token: &str, balance: &str, price: f64) -> PortfolioAsset {
    PortfolioAsset {
        token: token.to_string(),
        network: chain.name().to_string(),
        chain_id: chain.chain_id(),
        balance: balance.to_string(),
        value_usd: parse_amount(balance) * price,
    }
}

fn parse_amount(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChainRef;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot() -> WalletSnapshot {
        let mut snapshot = WalletSnapshot {
            address: Some("0xabc".to_string()),
            connected: true,
            ..WalletSnapshot::default()
        };
        snapshot.balances_by_chain.insert(
            ChainKey::Sepolia.chain_id(),
            BTreeMap::from([
                ("PYUSD".to_string(), "10.000000".to_string()),
                ("MEME".to_string(), "1000.000000".to_string()),
            ]),
        );
        snapshot.balances_by_chain.insert(
            ChainKey::BaseSepolia.chain_id(),
            BTreeMap::from([("USDC".to_string(), "2.500000".to_string())]),
        );
        snapshot
            .native_balance_by_chain
            .insert(ChainKey::Sepolia.chain_id(), "0.5".to_string());
        snapshot
            .native_balance_by_chain
            .insert(ChainKey::BaseSepolia.chain_id(), "0.0".to_string());
        snapshot.prices_usd = BTreeMap::from([
            ("ETH".to_string(), 2000.0),
            ("USDC".to_string(), 1.0),
            ("PYUSD".to_string(), 1.0),
        ]);
        snapshot
    }

    fn cashback(amount: &str) -> Transaction {
        Transaction {
            id: amount.to_string(),
            kind: TransactionKind::Cashback,
            token_symbol: "PYUSD".to_string(),
            source_chain: ChainRef::from(ChainKey::Sepolia),
            destination_chain: ChainRef::from(ChainKey::Sepolia),
            amount: amount.to_string(),
            receiver: "0xdef".to_string(),
            external_tx_reference: "0x1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unpriced_and_empty_holdings_are_dropped() {
        let portfolio = build_portfolio(&snapshot(), &[]);
        let rows: Vec<_> = portfolio
            .assets
            .iter()
            .map(|a| (a.token.as_str(), a.network.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![("PYUSD", "Sepolia"), ("USDC", "Base Sepolia"), ("ETH", "Sepolia")]
        );
        assert!((portfolio.total_value_usd - 1012.5).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_has_no_value() {
        let portfolio = build_portfolio(&WalletSnapshot::default(), &[]);
        assert!(portfolio.assets.is_empty());
        assert_eq!(portfolio.total_value_usd, 0.0);
    }

    #[test]
    fn cashback_earned_sums_cashback_rows_only() {
        let mut transfer = cashback("5");
        transfer.kind = TransactionKind::Transfer;
        let history = vec![cashback("0.002000"), transfer, cashback("0.004500")];
        assert!((cashback_earned(&history) - 0.0065).abs() < 1e-12);
    }
}
