//! Position sizing: reserved equity times leverage, converted to contracts at the mark price.

use rust_decimal::Decimal;

use crate::error::SignalError;

use super::TradingConfig;

/// Calculator for target position sizes.
pub struct PositionSizer {
    leverage: Decimal,
    reserved_fraction: Decimal,
    min_order_size: Option<Decimal>,
    size_decimals: u32,
}

impl PositionSizer {
    /// Create a new position sizer with given config.
    pub fn new(config: &TradingConfig) -> Self {
        Self {
            leverage: config.leverage,
            reserved_fraction: config.reserved_fraction,
            min_order_size: config.min_order_size,
            size_decimals: config.size_decimals,
        }
    }

    /// Calculate the target size for a fresh position.
    ///
    /// `target = round(equity * reserved_fraction * leverage / price)` to
    /// `size_decimals` places, half-to-even. A positive target below the
    /// configured floor is raised to the floor.
    ///
    /// # Errors
    /// `PricingUnavailable` when either input is missing or not positive, when
    /// the notional does not fit in a `Decimal`, or when the size rounds to zero.
    pub fn target_size(
        &self,
        equity: Option<Decimal>,
        price: Option<Decimal>,
    ) -> Result<Decimal, SignalError> {
        let equity = equity
            .filter(|e| *e > Decimal::ZERO)
            .ok_or_else(|| SignalError::PricingUnavailable("account equity is zero or unavailable".to_string()))?;
        let price = price
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| SignalError::PricingUnavailable("mark price is zero or unavailable".to_string()))?;

        let size = equity
            .checked_mul(self.reserved_fraction)
            .and_then(|n| n.checked_mul(self.leverage))
            .and_then(|notional| notional.checked_div(price))
            .ok_or_else(|| {
                SignalError::PricingUnavailable(format!(
                    "position size overflows (equity {}, leverage {}, price {})",
                    equity, self.leverage, price
                ))
            })?
            .round_dp(self.size_decimals);

        let size = self.apply_floor(size);
        if size.is_zero() {
            return Err(SignalError::PricingUnavailable(format!(
                "computed size rounds to zero (equity {}, price {})",
                equity, price
            )));
        }

        Ok(size)
    }

    fn apply_floor(&self, size: Decimal) -> Decimal {
        match self.min_order_size {
            Some(floor) if size > Decimal::ZERO && size < floor => floor,
            _ => size,
        }
    }
}
