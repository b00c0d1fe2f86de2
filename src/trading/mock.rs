//! Recording exchange double for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{AccountState, CancelAck, OrderAck, OrderEntry, OrderId, PositionEntry};

use super::Exchange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenOrders(String),
    AccountState(String),
    MarkPrice(String),
    Cancel(String, OrderId),
    MarketOrder { symbol: String, is_buy: bool, size: Decimal },
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::Cancel(..) | Call::MarketOrder { .. })
    }
}

/// Scripted exchange that records every call in order.
#[derive(Default)]
pub struct MockExchange {
    equity: Option<Decimal>,
    positions: Vec<PositionEntry>,
    orders: Vec<OrderEntry>,
    prices: HashMap<String, Decimal>,
    failing_cancels: HashSet<OrderId>,
    rejected_cancels: HashSet<OrderId>,
    reject_orders: Option<String>,
    fail_orders: bool,
    fail_state: bool,
    calls: Mutex<Vec<Call>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equity(mut self, equity: Decimal) -> Self {
        self.equity = Some(equity);
        self
    }

    pub fn with_position(mut self, symbol: &str, signed_size: Decimal) -> Self {
        self.positions.push(PositionEntry::new(symbol, signed_size));
        self
    }

    pub fn with_order(mut self, symbol: &str, order_id: OrderId) -> Self {
        self.orders.push(OrderEntry::new(symbol, order_id));
        self
    }

    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    /// Cancel of `order_id` fails at the transport level.
    pub fn failing_cancel(mut self, order_id: OrderId) -> Self {
        self.failing_cancels.insert(order_id);
        self
    }

    /// Cancel of `order_id` is answered with an error status.
    pub fn rejected_cancel(mut self, order_id: OrderId) -> Self {
        self.rejected_cancels.insert(order_id);
        self
    }

    pub fn rejecting_orders(mut self, message: &str) -> Self {
        self.reject_orders = Some(message.to_string());
        self
    }

    pub fn failing_orders(mut self) -> Self {
        self.fail_orders = true;
        self
    }

    pub fn failing_state(mut self) -> Self {
        self.fail_state = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn market_orders(&self) -> Vec<(String, bool, Decimal)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::MarketOrder { symbol, is_buy, size } => Some((symbol, is_buy, size)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn open_orders(&self, account: &str) -> Result<Vec<OrderEntry>> {
        self.record(Call::OpenOrders(account.to_string()));
        if self.fail_state {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.orders.clone())
    }

    async fn account_state(&self, account: &str) -> Result<AccountState> {
        self.record(Call::AccountState(account.to_string()));
        if self.fail_state {
            return Err(anyhow!("connection refused"));
        }
        Ok(AccountState {
            equity_value: self.equity,
            positions: self.positions.clone(),
        })
    }

    async fn mark_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        self.record(Call::MarkPrice(symbol.to_string()));
        Ok(self.prices.get(symbol).copied())
    }

    async fn cancel_order(&self, symbol: &str, order_id: OrderId) -> Result<CancelAck> {
        self.record(Call::Cancel(symbol.to_string(), order_id));
        if self.failing_cancels.contains(&order_id) {
            return Err(anyhow!("timeout cancelling {}", order_id));
        }
        if self.rejected_cancels.contains(&order_id) {
            return Ok(CancelAck::Error {
                message: "Order was never placed, already canceled, or filled.".to_string(),
            });
        }
        Ok(CancelAck::Ok)
    }

    async fn market_order(&self, symbol: &str, is_buy: bool, size: Decimal) -> Result<OrderAck> {
        self.record(Call::MarketOrder {
            symbol: symbol.to_string(),
            is_buy,
            size,
        });
        if self.fail_orders {
            return Err(anyhow!("error sending request"));
        }
        if let Some(message) = &self.reject_orders {
            return Ok(OrderAck::Error {
                message: message.clone(),
            });
        }
        Ok(OrderAck::Ok {
            order_id: Some(1),
            avg_price: self.prices.get(symbol).copied(),
            filled_size: Some(size),
        })
    }
}
