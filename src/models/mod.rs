//! Data models for signals, account state, operation plans, and execution reports.

mod account;
mod execution;
mod plan;
mod signal;

pub use account::{AccountSnapshot, AccountState, OrderEntry, OrderId, PositionEntry};
pub use execution::{CancelAck, CancelFailure, ExecutionReport, OrderAck, ReportStatus, TradeOutcome};
pub use plan::{OperationPlan, PlannedTrade, Side};
pub use signal::{Action, Signal};
