//! Exchange contract used by the reconciler, plus a dry-run wrapper.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::models::{AccountState, CancelAck, OrderAck, OrderEntry, OrderId};

/// Everything the reconciler needs from an exchange.
///
/// `Err` means the call itself failed (network, decoding). An exchange that
/// answered but refused the request returns `Ok` with an error ack.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Resting orders of `account`.
    async fn open_orders(&self, account: &str) -> Result<Vec<OrderEntry>>;

    /// Equity and positions of `account`.
    async fn account_state(&self, account: &str) -> Result<AccountState>;

    /// Current mark price of `symbol`, `None` if the exchange has no quote.
    async fn mark_price(&self, symbol: &str) -> Result<Option<Decimal>>;

    async fn cancel_order(&self, symbol: &str, order_id: OrderId) -> Result<CancelAck>;

    /// Submit a directional market order.
    async fn market_order(&self, symbol: &str, is_buy: bool, size: Decimal) -> Result<OrderAck>;

    /// Whether writes are simulated.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Reads from the wrapped exchange, logs writes instead of sending them.
pub struct DryRunExchange {
    inner: Arc<dyn Exchange>,
}

impl DryRunExchange {
    pub fn new(inner: Arc<dyn Exchange>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Exchange for DryRunExchange {
    async fn open_orders(&self, account: &str) -> Result<Vec<OrderEntry>> {
        self.inner.open_orders(account).await
    }

    async fn account_state(&self, account: &str) -> Result<AccountState> {
        self.inner.account_state(account).await
    }

    async fn mark_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        self.inner.mark_price(symbol).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: OrderId) -> Result<CancelAck> {
        info!(symbol = %symbol, oid = order_id, "[DRY RUN] Would cancel order");
        Ok(CancelAck::Ok)
    }

    async fn market_order(&self, symbol: &str, is_buy: bool, size: Decimal) -> Result<OrderAck> {
        let price = self.inner.mark_price(symbol).await?;
        info!(
            symbol = %symbol,
            side = if is_buy { "buy" } else { "sell" },
            size = %size,
            price = ?price,
            "[DRY RUN] Would submit market order"
        );

        Ok(OrderAck::Ok {
            order_id: None,
            avg_price: price,
            filled_size: Some(size),
        })
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}
