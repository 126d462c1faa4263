pub mod blockscout;
pub mod chat;
pub mod pyth;
pub mod pyusd;

pub use blockscout::{BlockscoutClient, TokenBalanceSource};
pub use chat::{ChatClient, ChatMessage};
pub use pyth::PythPriceFeed;
pub use pyusd::{PyusdToken, StablecoinTransfer, TxHandle};
