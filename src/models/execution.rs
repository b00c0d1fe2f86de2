//! Exchange acknowledgements and the per-signal execution report.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Action, OrderEntry, Side};

/// Exchange answer to an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OrderAck {
    /// Order accepted. `avg_price` is set when the exchange reported a fill.
    Ok {
        order_id: Option<u64>,
        avg_price: Option<Decimal>,
        filled_size: Option<Decimal>,
    },
    /// Exchange returned a non-ok status.
    Error { message: String },
}

/// Exchange answer to a cancel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CancelAck {
    Ok,
    Error { message: String },
}

/// Outcome of one planned trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TradeOutcome {
    Executed {
        symbol: String,
        direction: Side,
        size: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        price: Option<Decimal>,
        #[serde(skip_serializing_if = "Option::is_none")]
        order_id: Option<u64>,
    },
    Rejected {
        symbol: String,
        direction: Side,
        size: Decimal,
        reason: String,
    },
}

/// A cancellation that did not go through. Never fatal to the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelFailure {
    pub order: OrderEntry,
    pub reason: String,
}

/// Overall result class of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportStatus {
    /// Nothing to trade (close with no open position, or zero-size target)
    NoPositionChange,
    /// Every trade was accepted
    Executed,
    /// At least one trade was rejected by the exchange
    Rejected,
}

/// What happened while executing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub signal_id: Uuid,
    pub action: Action,
    pub status: ReportStatus,
    pub cancelled: usize,
    pub cancel_failures: Vec<CancelFailure>,
    pub trades: Vec<TradeOutcome>,
    pub dry_run: bool,
}

impl ExecutionReport {
    pub fn new(
        signal_id: Uuid,
        action: Action,
        cancelled: usize,
        cancel_failures: Vec<CancelFailure>,
        trades: Vec<TradeOutcome>,
        dry_run: bool,
    ) -> Self {
        let status = if trades.is_empty() {
            ReportStatus::NoPositionChange
        } else if trades
            .iter()
            .any(|t| matches!(t, TradeOutcome::Rejected { .. }))
        {
            ReportStatus::Rejected
        } else {
            ReportStatus::Executed
        };

        Self {
            signal_id,
            action,
            status,
            cancelled,
            cancel_failures,
            trades,
            dry_run,
        }
    }

    /// True when one or more cancellations failed.
    pub fn partial_cancel_failure(&self) -> bool {
        !self.cancel_failures.is_empty()
    }

    /// First rejection reason, if any trade was rejected.
    pub fn rejection(&self) -> Option<&str> {
        self.trades.iter().find_map(|t| match t {
            TradeOutcome::Rejected { reason, .. } => Some(reason.as_str()),
            TradeOutcome::Executed { .. } => None,
        })
    }
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Signal {} ({}) ===", self.signal_id, self.action)?;
        writeln!(f, "Status:           {:?}{}", self.status, if self.dry_run { " (Dry Run)" } else { "" })?;
        writeln!(f, "Orders Cancelled: {}", self.cancelled)?;
        for failure in &self.cancel_failures {
            writeln!(
                f,
                "  Cancel failed:  {} #{} - {}",
                failure.order.symbol, failure.order.order_id, failure.reason
            )?;
        }
        for trade in &self.trades {
            match trade {
                TradeOutcome::Executed { symbol, direction, size, price, .. } => {
                    let price = price.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                    writeln!(f, "  Executed:       {} {} {} @ {}", direction, size, symbol, price)?;
                }
                TradeOutcome::Rejected { symbol, direction, size, reason } => {
                    writeln!(f, "  Rejected:       {} {} {} - {}", direction, size, symbol, reason)?;
                }
            }
        }
        Ok(())
    }
}
