//! Account state as reported by the exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange-assigned order identifier.
pub type OrderId = u64;

/// A resting (unfilled) order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    pub symbol: String,
    pub order_id: OrderId,
}

impl OrderEntry {
    pub fn new(symbol: impl Into<String>, order_id: OrderId) -> Self {
        Self {
            symbol: symbol.into(),
            order_id,
        }
    }
}

/// Current exposure on one market. Positive is long, negative short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEntry {
    pub symbol: String,
    pub signed_size: Decimal,
}

impl PositionEntry {
    pub fn new(symbol: impl Into<String>, signed_size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            signed_size,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.signed_size.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.signed_size > Decimal::ZERO
    }
}

/// Equity and positions, without open orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    /// Total account value in USDC. `None` when the exchange did not report it.
    pub equity_value: Option<Decimal>,
    pub positions: Vec<PositionEntry>,
}

/// Everything the engine needs to know about the account, fetched fresh per signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub equity_value: Option<Decimal>,
    pub positions: Vec<PositionEntry>,
    pub open_orders: Vec<OrderEntry>,
}

impl AccountSnapshot {
    pub fn new(state: AccountState, open_orders: Vec<OrderEntry>) -> Self {
        Self {
            equity_value: state.equity_value,
            positions: state.positions,
            open_orders,
        }
    }

    /// Signed size held on `symbol`, zero if there is no entry.
    pub fn position_size(&self, symbol: &str) -> Decimal {
        self.positions
            .iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.signed_size)
            .unwrap_or(Decimal::ZERO)
    }

    /// Positions with non-zero size.
    pub fn open_positions(&self) -> impl Iterator<Item = &PositionEntry> {
        self.positions.iter().filter(|p| !p.is_flat())
    }
}
