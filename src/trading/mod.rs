//! Trading logic: signal validation, position sizing, reconciliation.

mod account_lock;
mod config;
mod exchange;
#[cfg(test)]
pub(crate) mod mock;
mod position_sizer;
mod reconciler;
mod validator;

pub use account_lock::AccountLocks;
pub use config::{SizingPolicy, TradingConfig};
pub use exchange::{DryRunExchange, Exchange};
pub use position_sizer::PositionSizer;
pub use reconciler::Reconciler;
pub use validator::SignalValidator;
