//! Hyperliquid API clients for account state and order execution.

mod exchange_client;
mod info_client;
mod signing;
mod types;

pub use exchange_client::ExchangeClient;
pub use info_client::{InfoClient, MAINNET_API_URL, TESTNET_API_URL};
pub use types::*;
