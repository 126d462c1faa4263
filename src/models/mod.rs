// src/models/mod.rs
pub mod response;
pub mod wallet;

pub use response::ApiResponse;
pub use wallet::{
    ChainKey, ChainRef, NewTransaction, PriceData, SimulationResult, Transaction,
    TransactionKind, TransferForm, WalletSnapshot,
};
