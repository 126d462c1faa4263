use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::{
    constants::{BALANCE_EPSILON, FALLBACK_PRICES_USD, PRICE_FEEDS, STORE_EVENT_CAPACITY},
    error::Result,
    integrations::{PythPriceFeed, StablecoinTransfer, TokenBalanceSource},
    models::{ChainKey, NewTransaction, Transaction, WalletSnapshot},
    services::chain::ChainProvider,
};

/// Change notifications pushed to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    Connected { address: String },
    SnapshotUpdated { snapshot: WalletSnapshot },
    TransactionAdded { transaction: Transaction },
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    NotConnected,
    Updated,
    FellBack,
    /// The session changed while fetching; results were dropped.
    Discarded,
}

#[derive(Default)]
struct StoreState {
    snapshot: WalletSnapshot,
    provider: Option<Arc<dyn ChainProvider>>,
    stablecoin: Option<Arc<dyn StablecoinTransfer>>,
    history: Vec<Transaction>,
}

/// The open wallet session as seen by writers that must not outlive it.
#[derive(Clone)]
pub struct ActiveSession {
    pub id: u64,
    pub address: String,
    pub provider: Arc<dyn ChainProvider>,
}

struct BalanceAggregate {
    native: BTreeMap<u64, String>,
    raw: BTreeMap<u64, BTreeMap<String, String>>,
    filtered: BTreeMap<u64, BTreeMap<String, String>>,
    prices: BTreeMap<String, f64>,
}

/// Single source of truth for the connected wallet, its balances and history.
///
/// The secondary chain reader, the explorer client and the price feed are
/// fixed at construction; the connected provider and stablecoin client arrive
/// with [`WalletStore::set_wallet_data`] and leave with
/// [`WalletStore::disconnect_wallet`].
pub struct WalletStore {
    state: RwLock<StoreState>,
    // Bumped on every connect and disconnect; refreshes only commit into the
    // session they started in.
    session: std::sync::atomic::AtomicU64,
    tx_sequence: std::sync::atomic::AtomicU64,
    token_balances: Arc<dyn TokenBalanceSource>,
    price_feed: PythPriceFeed,
    secondary_chain: Arc<dyn ChainProvider>,
    events: broadcast::Sender<StoreEvent>,
}

impl WalletStore {
    pub fn new(
        token_balances: Arc<dyn TokenBalanceSource>,
        price_feed: PythPriceFeed,
        secondary_chain: Arc<dyn ChainProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(STORE_EVENT_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            session: std::sync::atomic::AtomicU64::new(0),
            tx_sequence: std::sync::atomic::AtomicU64::new(0),
            token_balances,
            price_feed,
            secondary_chain,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn current_session(&self) -> u64 {
        self.session.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn next_session(&self) -> u64 {
        self.session.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
    }

    pub async fn snapshot(&self) -> WalletSnapshot {
        self.state.read().await.snapshot.clone()
    }

    /// Newest first.
    pub async fn history(&self) -> Vec<Transaction> {
        self.state.read().await.history.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.snapshot.connected
    }

    /// Session id, address and provider read together, or `None` when disconnected.
    pub async fn active_session(&self) -> Option<ActiveSession> {
        let state = self.state.read().await;
        match (&state.snapshot.address, &state.provider) {
            (Some(address), Some(provider)) if state.snapshot.connected => Some(ActiveSession {
                id: self.current_session(),
                address: address.clone(),
                provider: provider.clone(),
            }),
            _ => None,
        }
    }

    pub async fn stablecoin(&self) -> Option<Arc<dyn StablecoinTransfer>> {
        self.state.read().await.stablecoin.clone()
    }

    /// Marks the wallet connected, keeps its handles and refreshes balances.
    pub async fn set_wallet_data(
        &self,
        address: String,
        provider: Arc<dyn ChainProvider>,
        stablecoin: Arc<dyn StablecoinTransfer>,
    ) -> RefreshOutcome {
        {
            let mut state = self.state.write().await;
            self.next_session();
            if state.snapshot.address.as_deref() != Some(address.as_str()) {
                // Another account's balances must not show under this one.
                state.snapshot = WalletSnapshot::default();
            }
            state.snapshot.address = Some(address.clone());
            state.snapshot.connected = true;
            state.provider = Some(provider);
            state.stablecoin = Some(stablecoin);
        }
        tracing::info!("[STORE] Wallet connected: {}", address);
        self.publish(StoreEvent::Connected { address });

        self.update_balances().await
    }

    /// Resets every field to its default. The only teardown path.
    pub async fn disconnect_wallet(&self) {
        {
            let mut state = self.state.write().await;
            self.next_session();
            *state = StoreState::default();
        }
        tracing::info!("[STORE] Wallet disconnected");
        self.publish(StoreEvent::Disconnected);
    }

    /// Stamps `entry` with an id and time and puts it at the head of the history.
    /// The write is dropped when `session` is no longer the open session, so a
    /// disconnect always leaves an empty history behind.
    pub async fn add_transaction(&self, session: u64, entry: NewTransaction) -> Option<Transaction> {
        let transaction = {
            let mut state = self.state.write().await;
            if self.current_session() != session || !state.snapshot.connected {
                tracing::warn!(
                    "[STORE] Dropping {:?} record {} for closed session {}",
                    entry.kind,
                    entry.external_tx_reference,
                    session
                );
                return None;
            }
            let created_at = Utc::now();
            let sequence = self
                .tx_sequence
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let transaction = entry.into_transaction(
                format!("{}-{}", created_at.timestamp_millis(), sequence),
                created_at,
            );
            state.history.insert(0, transaction.clone());
            transaction
        };

        tracing::debug!(
            "[STORE] Recorded {:?} {} {}",
            transaction.kind,
            transaction.amount,
            transaction.token_symbol
        );
        self.publish(StoreEvent::TransactionAdded {
            transaction: transaction.clone(),
        });
        Some(transaction)
    }

    /// Re-reads native balances, token balances and prices for the connected
    /// wallet and replaces the snapshot's balance fields in one commit.
    pub async fn update_balances(&self) -> RefreshOutcome {
        let Some(ActiveSession {
            id: session,
            address,
            provider,
        }) = self.active_session().await
        else {
            return RefreshOutcome::NotConnected;
        };

        let aggregate = self.collect_balances(&address, provider.as_ref()).await;

        let (outcome, snapshot) = {
            let mut state = self.state.write().await;
            if self.current_session() != session || !state.snapshot.connected {
                tracing::debug!("[STORE] Dropping balance refresh for stale session {}", session);
                return RefreshOutcome::Discarded;
            }
            let outcome = match aggregate {
                Ok(aggregate) => {
                    state.snapshot.native_balance_by_chain = aggregate.native;
                    state.snapshot.raw_balances_by_chain = aggregate.raw;
                    state.snapshot.balances_by_chain = aggregate.filtered;
                    state.snapshot.prices_usd = aggregate.prices;
                    RefreshOutcome::Updated
                }
                Err(e) => {
                    tracing::error!("[STORE] Failed to update balances: {}", e);
                    state.snapshot.native_balance_by_chain = ChainKey::all()
                        .into_iter()
                        .map(|chain| (chain.chain_id(), "0".to_string()))
                        .collect();
                    state.snapshot.raw_balances_by_chain = BTreeMap::new();
                    state.snapshot.balances_by_chain = BTreeMap::new();
                    state.snapshot.prices_usd = fallback_prices();
                    RefreshOutcome::FellBack
                }
            };
            state.snapshot.updated_at = Some(Utc::now());
            (outcome, state.snapshot.clone())
        };

        tracing::debug!(
            "[STORE] Native balances: {:?}; balances: {:?}; prices: {:?}",
            snapshot.native_balance_by_chain,
            snapshot.balances_by_chain,
            snapshot.prices_usd
        );
        self.publish(StoreEvent::SnapshotUpdated { snapshot });
        outcome
    }

    async fn collect_balances(
        &self,
        address: &str,
        provider: &dyn ChainProvider,
    ) -> Result<BalanceAggregate> {
        let primary_chain = provider.chain();
        let secondary_chain = self.secondary_chain.chain();

        let (primary_native, secondary_native, sepolia_tokens, base_tokens, prices) = tokio::join!(
            provider.native_balance(address),
            self.secondary_chain.native_balance(address),
            self.token_balances.fetch_balances(address, ChainKey::Sepolia),
            self.token_balances.fetch_balances(address, ChainKey::BaseSepolia),
            self.fetch_prices(),
        );

        let mut native = BTreeMap::new();
        native.insert(primary_chain.chain_id(), primary_native?);
        native.insert(secondary_chain.chain_id(), secondary_native?);

        let mut raw = BTreeMap::new();
        let mut filtered = BTreeMap::new();
        for (chain, tokens) in [(ChainKey::Sepolia, sepolia_tokens), (ChainKey::BaseSepolia, base_tokens)] {
            let tokens: BTreeMap<String, String> = tokens.into_iter().collect();
            filtered.insert(chain.chain_id(), filter_dust(&tokens));
            raw.insert(chain.chain_id(), tokens);
        }

        Ok(BalanceAggregate {
            native,
            raw,
            filtered,
            prices,
        })
    }

    async fn fetch_prices(&self) -> BTreeMap<String, f64> {
        let ids: Vec<&str> = PRICE_FEEDS.iter().map(|(_, id)| *id).collect();
        let prices = self.price_feed.get_multiple_prices(&ids).await;
        map_prices(&prices)
    }
}

/// Keeps only balances that parse to more than the dust threshold.
pub fn filter_dust(balances: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    balances
        .iter()
        .filter(|(_, balance)| {
            balance
                .trim()
                .parse::<f64>()
                .map(|value| value > BALANCE_EPSILON)
                .unwrap_or(false)
        })
        .map(|(symbol, balance)| (symbol.clone(), balance.clone()))
        .collect()
}

pub fn fallback_prices() -> BTreeMap<String, f64> {
    FALLBACK_PRICES_USD
        .iter()
        .map(|(symbol, price)| (symbol.to_string(), *price))
        .collect()
}

// Internal helper that maps feed ids back to symbols, substituting defaults for
// zeroed or invalid reads.
fn map_prices(prices: &HashMap<String, crate::models::PriceData>) -> BTreeMap<String, f64> {
    let fallback = fallback_prices();
    PRICE_FEEDS
        .iter()
        .map(|(symbol, id)| {
            let price = prices
                .get(*id)
                .map(|data| data.price)
                .filter(|price| price.is_finite() && *price > 0.0)
                .or_else(|| fallback.get(*symbol).copied())
                .unwrap_or(0.0);
            (symbol.to_string(), price)
        })
        .collect()
}
