//! Trading configuration.

use anyhow::{ensure, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How to size an order when a position already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingPolicy {
    /// Always trade `target + |current|` in the signal direction. Adds to a
    /// position that already points the same way.
    #[default]
    Compound,
    /// Trade the difference between the current position and `±target`.
    Rebalance,
}

impl std::str::FromStr for SizingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compound" => Ok(Self::Compound),
            "rebalance" => Ok(Self::Rebalance),
            other => Err(format!("unknown sizing policy '{}' (expected compound or rebalance)", other)),
        }
    }
}

impl std::fmt::Display for SizingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizingPolicy::Compound => f.write_str("compound"),
            SizingPolicy::Rebalance => f.write_str("rebalance"),
        }
    }
}

/// Configuration for sizing and reconciling signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Market traded on buy/sell signals (e.g. "ETH")
    pub symbol: String,

    /// Multiplier applied to reserved equity. Not clamped to exchange limits.
    pub leverage: Decimal,

    /// Share of equity used for sizing, strictly between 0 and 1
    pub reserved_fraction: Decimal,

    /// Optional minimum order size; smaller positive targets are raised to it
    pub min_order_size: Option<Decimal>,

    /// Sizing when a position is already open
    pub sizing_policy: SizingPolicy,

    /// Decimal places of the computed target size
    pub size_decimals: u32,

    /// Price tolerance for IOC market orders (0.05 = 5%)
    pub slippage: Decimal,

    /// Serialize concurrent signals against the same account
    pub serialize_signals: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "ETH".to_string(),
            leverage: dec!(1.0),
            reserved_fraction: dec!(0.98), // Keep 2% headroom for slippage and fees
            min_order_size: None,
            sizing_policy: SizingPolicy::Compound,
            size_decimals: 4,
            slippage: dec!(0.05),
            serialize_signals: true,
        }
    }
}

impl TradingConfig {
    /// Reject values the sizer cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.symbol.is_empty(), "symbol must not be empty");
        ensure!(
            self.reserved_fraction > Decimal::ZERO && self.reserved_fraction < Decimal::ONE,
            "reserved fraction must be between 0 and 1 (exclusive), got {}",
            self.reserved_fraction
        );
        ensure!(self.leverage > Decimal::ZERO, "leverage must be positive, got {}", self.leverage);
        ensure!(
            self.slippage >= Decimal::ZERO && self.slippage < Decimal::ONE,
            "slippage must be in [0, 1), got {}",
            self.slippage
        );
        if let Some(floor) = self.min_order_size {
            ensure!(floor > Decimal::ZERO, "minimum order size must be positive, got {}", floor);
        }
        Ok(())
    }
}
