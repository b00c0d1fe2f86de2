//! Operation plans computed by the reconciler.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderEntry;

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_is_buy(is_buy: bool) -> Self {
        if is_buy {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single directional market order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTrade {
    pub symbol: String,
    pub is_buy: bool,
    pub size: Decimal,
}

impl PlannedTrade {
    pub fn new(symbol: impl Into<String>, is_buy: bool, size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            is_buy,
            size,
        }
    }

    pub fn side(&self) -> Side {
        Side::from_is_buy(self.is_buy)
    }
}

/// Operations to run for one signal: every cancellation first, then the trades.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPlan {
    pub cancellations: Vec<OrderEntry>,
    pub trades: Vec<PlannedTrade>,
    /// Mark price the trades were sized against, if one was needed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
}
