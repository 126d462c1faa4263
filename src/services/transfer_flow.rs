use rust_decimal::prelude::{FromPrimitive, RoundingStrategy};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    constants::{
        CASHBACK_DECIMALS, CASHBACK_MIN_BPS, CASHBACK_SPAN_BPS, PYUSD_SYMBOL, SIMULATED_TX_REF,
    },
    error::{AppError, Result},
    integrations::StablecoinTransfer,
    models::{
        ChainKey, ChainRef, NewTransaction, SimulationResult, Transaction, TransactionKind,
        TransferForm,
    },
    services::wallet_store::WalletStore,
};

/// Source of the uniform draw in `[0, 1]` that sizes a cashback.
pub trait CashbackRng: Send + Sync {
    fn draw(&self) -> f64;
}

pub struct ThreadCashbackRng;

impl CashbackRng for ThreadCashbackRng {
    fn draw(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Cashback owed on `amount` for a draw `r`: `amount * (10 + 40r) / 10000`,
/// rounded to six decimals.
pub fn cashback_amount(amount: &str, draw: f64) -> Result<Decimal> {
    let amount = Decimal::from_str(amount.trim())
        .map_err(|_| AppError::InvalidAmount(amount.to_string()))?;
    if amount.is_sign_negative() {
        return Err(AppError::InvalidAmount(amount.to_string()));
    }
    let draw = if draw.is_finite() { draw.clamp(0.0, 1.0) } else { 0.0 };
    let span = Decimal::from_f64(draw * CASHBACK_SPAN_BPS).unwrap_or(Decimal::ZERO);
    let bps = Decimal::from_f64(CASHBACK_MIN_BPS).unwrap_or(Decimal::TEN) + span;
    let cashback = amount
        .checked_mul(bps)
        .and_then(|scaled| scaled.checked_div(Decimal::from(10_000u32)))
        .ok_or_else(|| AppError::InvalidAmount(format!("{} is too large", amount)))?;
    Ok(cashback.round_dp_with_strategy(CASHBACK_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// One line of user-facing feedback about a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: String) -> Self {
        Self {
            level: NoticeLevel::Success,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            level: NoticeLevel::Error,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub tx_hash: String,
    /// `None` when the wallet session closed before the transfer was recorded.
    pub transfer: Option<Transaction>,
    pub cashback: Option<Transaction>,
    pub cashback_amount: String,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Idle,
    Simulated {
        simulation: SimulationResult,
    },
    Transferring {
        simulation: SimulationResult,
    },
    Settled {
        outcome: TransferOutcome,
    },
    Failed {
        simulation: SimulationResult,
        error: String,
    },
}

impl FlowState {
    fn simulation(&self) -> Option<&SimulationResult> {
        match self {
            FlowState::Simulated { simulation }
            | FlowState::Transferring { simulation }
            | FlowState::Failed { simulation, .. } => Some(simulation),
            FlowState::Idle | FlowState::Settled { .. } => None,
        }
    }
}

/// Dialog controller: preview a transfer, send it, then pay the cashback.
pub struct TransferFlow {
    state: FlowState,
    treasury: Option<Arc<dyn StablecoinTransfer>>,
    rng: Box<dyn CashbackRng>,
}

impl TransferFlow {
    pub fn new(treasury: Option<Arc<dyn StablecoinTransfer>>, rng: Box<dyn CashbackRng>) -> Self {
        Self {
            state: FlowState::Idle,
            treasury,
            rng,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Builds the preview shown before sending. Incomplete forms are ignored.
    pub fn simulate(&mut self, form: &TransferForm) -> Option<SimulationResult> {
        if !form.is_complete() {
            tracing::debug!("Ignoring simulate request with missing fields");
            return None;
        }
        let requested = form.chain_id.trim();
        if requested
            .parse::<u64>()
            .ok()
            .and_then(ChainKey::from_chain_id)
            .is_none()
        {
            tracing::warn!(
                "Requested chain {} is not supported; simulating to {}",
                requested,
                ChainKey::BaseSepolia.name()
            );
        }
        let simulation = SimulationResult {
            token_symbol: form.token.trim().to_string(),
            source_chain: ChainRef::from(ChainKey::Sepolia),
            destination_chain: ChainRef::from(ChainKey::BaseSepolia),
            requested_chain_id: requested.to_string(),
            amount: form.amount.trim().to_string(),
            receiver: form.recipient.trim().to_string(),
            external_tx_reference: SIMULATED_TX_REF.to_string(),
        };
        self.state = FlowState::Simulated {
            simulation: simulation.clone(),
        };
        Some(simulation)
    }

    pub fn reset(&mut self) {
        self.state = FlowState::Idle;
    }

    /// Sends the simulated transfer from the connected wallet, records it, then
    /// pays the cashback from the treasury. Cashback failures are reported as a
    /// notice and never undo the transfer. Records are only written into the
    /// wallet session the transfer started in.
    pub async fn execute(&mut self, store: &WalletStore) -> Result<TransferOutcome> {
        let simulation = self
            .state
            .simulation()
            .cloned()
            .ok_or(AppError::NoSimulation)?;
        let session = store
            .active_session()
            .await
            .ok_or(AppError::WalletNotConnected)?;
        // Sized before anything is signed so a bad amount never reaches the chain.
        let cashback = cashback_amount(&simulation.amount, self.rng.draw())?;
        let cashback_str = format!("{:.6}", cashback);

        self.state = FlowState::Transferring {
            simulation: simulation.clone(),
        };

        let tx_hash = match session
            .provider
            .send_native(&simulation.receiver, &simulation.amount)
            .await
        {
            Ok(hash) => hash,
            Err(e) => {
                tracing::error!("Transfer failed: {}", e);
                self.state = FlowState::Failed {
                    simulation,
                    error: e.to_string(),
                };
                return Err(e);
            }
        };

        let mut notices = vec![Notice::success(format!(
            "Transfer successful! Transaction hash: {}",
            tx_hash
        ))];

        let transfer = store
            .add_transaction(
                session.id,
                NewTransaction {
                    kind: TransactionKind::Transfer,
                    token_symbol: simulation.token_symbol.clone(),
                    source_chain: ChainRef::from(ChainKey::Sepolia),
                    destination_chain: ChainRef::from(ChainKey::BaseSepolia),
                    amount: simulation.amount.clone(),
                    receiver: simulation.receiver.clone(),
                    external_tx_reference: tx_hash.clone(),
                },
            )
            .await;

        let cashback_tx = if transfer.is_none() {
            tracing::warn!("Wallet session closed during transfer {}; cashback skipped", tx_hash);
            notices.push(Notice::error(
                "Cashback skipped: wallet disconnected before the transfer was recorded".to_string(),
            ));
            None
        } else {
            match self.pay_cashback(&simulation.receiver, &cashback_str).await {
                Ok(hash) => {
                    notices.push(Notice::success(format!(
                        "Cashback sent: {} {}",
                        cashback_str, PYUSD_SYMBOL
                    )));
                    store
                        .add_transaction(
                            session.id,
                            NewTransaction {
                                kind: TransactionKind::Cashback,
                                token_symbol: PYUSD_SYMBOL.to_string(),
                                source_chain: ChainRef::from(ChainKey::Sepolia),
                                destination_chain: ChainRef::from(ChainKey::Sepolia),
                                amount: cashback_str.clone(),
                                receiver: simulation.receiver.clone(),
                                external_tx_reference: hash,
                            },
                        )
                        .await
                }
                Err(e) => {
                    tracing::error!("Cashback failed: {}", e);
                    notices.push(Notice::error(format!("Cashback failed: {}", e)));
                    None
                }
            }
        };

        let outcome = TransferOutcome {
            tx_hash,
            transfer,
            cashback: cashback_tx,
            cashback_amount: cashback_str,
            notices,
        };
        self.state = FlowState::Settled {
            outcome: outcome.clone(),
        };
        Ok(outcome)
    }

    // Internal helper that sends PYUSD from the treasury and returns the tx hash.
    async fn pay_cashback(&self, receiver: &str, amount: &str) -> Result<String> {
        let treasury = self
            .treasury
            .as_ref()
            .ok_or_else(|| AppError::SignerUnavailable("treasury".to_string()))?;
        let handle = treasury.transfer(receiver, amount).await?;
        Ok(handle.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WalletSnapshot;
    use crate::services::wallet_store::tests::{
        connect, store, FakeChain, FakeStablecoin, GatedChain, ADDRESS, RECIPIENT,
    };
    use tokio::sync::Notify;

    struct FixedDraw(f64);

    impl CashbackRng for FixedDraw {
        fn draw(&self) -> f64 {
            self.0
        }
    }

    fn form(amount: &str) -> TransferForm {
        TransferForm {
            token: "ETH".to_string(),
            amount: amount.to_string(),
            chain_id: "84532".to_string(),
            recipient: RECIPIENT.to_string(),
        }
    }

    fn flow(treasury: Option<FakeStablecoin>, draw: f64) -> TransferFlow {
        TransferFlow::new(
            treasury.map(|t| Arc::new(t) as Arc<dyn StablecoinTransfer>),
            Box::new(FixedDraw(draw)),
        )
    }

    #[test]
    fn cashback_stays_within_bounds() {
        let amount = Decimal::from_str("250").unwrap();
        for draw in [0.0, 0.13, 0.5, 0.999, 1.0] {
            let cashback = cashback_amount("250", draw).unwrap();
            assert!(cashback >= amount * Decimal::from_str("0.001").unwrap());
            assert!(cashback <= amount * Decimal::from_str("0.005").unwrap());
        }
        assert_eq!(cashback_amount("250", 0.0).unwrap(), Decimal::from_str("0.25").unwrap());
        assert_eq!(cashback_amount("250", 1.0).unwrap(), Decimal::from_str("1.25").unwrap());
    }

    #[test]
    fn cashback_rounds_to_six_decimals() {
        let cashback = cashback_amount("0.1234567", 0.5).unwrap();
        assert!(cashback.scale() <= 6);
        assert!(cashback_amount("abc", 0.5).is_err());
        assert!(cashback_amount("-1", 0.5).is_err());
    }

    #[test]
    fn cashback_overflow_is_an_invalid_amount() {
        // Parses as a Decimal, but amount * 50 does not fit.
        let huge = "2000000000000000000000000000";
        assert!(cashback_amount(huge, 0.0).is_ok());
        assert!(matches!(
            cashback_amount(huge, 1.0),
            Err(AppError::InvalidAmount(_))
        ));
    }

    #[test]
    fn simulate_requires_every_field() {
        let mut flow = flow(None, 0.5);
        let mut incomplete = form("1.0");
        incomplete.recipient = "  ".to_string();
        assert!(flow.simulate(&incomplete).is_none());
        assert!(matches!(flow.state(), FlowState::Idle));

        let simulation = flow.simulate(&form("1.0")).unwrap();
        assert_eq!(simulation.source_chain.id, 11_155_111);
        assert_eq!(simulation.destination_chain.id, 84_532);
        assert_eq!(simulation.external_tx_reference, "simulated");
        assert!(matches!(flow.state(), FlowState::Simulated { .. }));

        flow.reset();
        assert!(matches!(flow.state(), FlowState::Idle));
    }

    #[tokio::test]
    async fn execute_without_simulation_is_rejected() {
        let store = store();
        let mut flow = flow(None, 0.5);
        assert!(matches!(
            flow.execute(&store).await,
            Err(AppError::NoSimulation)
        ));
    }

    #[tokio::test]
    async fn execute_requires_connected_wallet() {
        let store = store();
        let mut flow = flow(None, 0.5);
        flow.simulate(&form("1.0"));
        assert!(matches!(
            flow.execute(&store).await,
            Err(AppError::WalletNotConnected)
        ));
    }

    #[tokio::test]
    async fn failed_cashback_keeps_the_transfer() {
        let store = store();
        connect(&store, FakeChain::new(ChainKey::Sepolia, "5")).await;
        let mut flow = flow(Some(FakeStablecoin::new(true)), 0.5);
        flow.simulate(&form("1.0"));

        let outcome = flow.execute(&store).await.unwrap();
        assert!(outcome.cashback.is_none());
        assert_eq!(outcome.notices.len(), 2);
        assert_eq!(outcome.notices[0].level, NoticeLevel::Success);
        assert!(outcome.notices[0].message.contains("0xprimary"));
        assert_eq!(outcome.notices[1].level, NoticeLevel::Error);
        assert!(outcome.notices[1].message.starts_with("Cashback failed:"));

        let history = store.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Transfer);
        assert_eq!(history[0].external_tx_reference, "0xprimary");
        assert!(matches!(flow.state(), FlowState::Settled { .. }));
    }

    #[tokio::test]
    async fn successful_cashback_is_recorded_after_transfer() {
        let store = store();
        connect(&store, FakeChain::new(ChainKey::Sepolia, "5")).await;
        let mut flow = flow(Some(FakeStablecoin::new(false)), 0.5);
        flow.simulate(&form("2.0"));

        let outcome = flow.execute(&store).await.unwrap();
        // 2.0 * 30 / 10000
        assert_eq!(outcome.cashback_amount, "0.006000");

        let history = store.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Cashback);
        assert_eq!(history[0].token_symbol, "PYUSD");
        assert_eq!(history[0].destination_chain.id, 11_155_111);
        assert_eq!(history[0].receiver, RECIPIENT);
        assert_eq!(history[1].kind, TransactionKind::Transfer);
        assert_eq!(history[1].destination_chain.id, 84_532);
    }

    #[tokio::test]
    async fn missing_treasury_reports_cashback_failure() {
        let store = store();
        connect(&store, FakeChain::new(ChainKey::Sepolia, "5")).await;
        let mut flow = flow(None, 0.0);
        flow.simulate(&form("3"));

        let outcome = flow.execute(&store).await.unwrap();
        assert!(outcome.cashback.is_none());
        assert_eq!(store.history().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_transfer_records_nothing_and_allows_retry() {
        let store = store();
        let mut primary = FakeChain::new(ChainKey::Sepolia, "5");
        primary.fail_send = true;
        connect(&store, primary).await;
        let mut flow = flow(Some(FakeStablecoin::new(false)), 0.5);
        flow.simulate(&form("1.0"));

        let err = flow.execute(&store).await.unwrap_err();
        assert!(matches!(err, AppError::BlockchainRPC(_)));
        assert!(store.history().await.is_empty());
        match flow.state() {
            FlowState::Failed { simulation, error } => {
                assert_eq!(simulation.amount, "1.0");
                assert!(error.contains("user rejected"));
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected_before_sending() {
        let store = store();
        let primary = Arc::new(FakeChain::new(ChainKey::Sepolia, "5"));
        store
            .set_wallet_data(
                ADDRESS.to_string(),
                primary.clone(),
                Arc::new(FakeStablecoin::new(false)),
            )
            .await;
        let mut flow = flow(Some(FakeStablecoin::new(false)), 1.0);
        flow.simulate(&form("2000000000000000000000000000"));

        let err = flow.execute(&store).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
        assert!(primary.sent.lock().unwrap().is_empty());
        assert!(store.history().await.is_empty());
        assert!(matches!(flow.state(), FlowState::Simulated { .. }));
    }

    #[tokio::test]
    async fn disconnect_during_transfer_records_nothing() {
        let store = store();
        let gate = Arc::new(Notify::new());
        let primary = GatedChain {
            inner: FakeChain::new(ChainKey::Sepolia, "5"),
            gate: gate.clone(),
            hold_balance: false,
            hold_send: true,
        };
        store
            .set_wallet_data(
                ADDRESS.to_string(),
                Arc::new(primary),
                Arc::new(FakeStablecoin::new(false)),
            )
            .await;
        let treasury = Arc::new(FakeStablecoin::new(false));
        let mut flow = TransferFlow::new(
            Some(treasury.clone() as Arc<dyn StablecoinTransfer>),
            Box::new(FixedDraw(0.5)),
        );
        flow.simulate(&form("1.0"));

        let (result, _) = tokio::join!(flow.execute(&store), async {
            store.disconnect_wallet().await;
            gate.notify_one();
        });

        let outcome = result.unwrap();
        assert_eq!(outcome.tx_hash, "0xprimary");
        assert!(outcome.transfer.is_none());
        assert!(outcome.cashback.is_none());
        assert_eq!(outcome.notices.len(), 2);
        assert_eq!(outcome.notices[1].level, NoticeLevel::Error);
        assert!(treasury.transfers.lock().unwrap().is_empty());

        assert!(store.history().await.is_empty());
        assert_eq!(store.snapshot().await, WalletSnapshot::default());
    }
}
