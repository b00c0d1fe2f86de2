//! Reconciliation engine: turns a signal plus fresh account state into cancels and trades.
//!
//! Every signal goes through the same pass:
//! 1. validate the payload (no exchange access before this succeeds)
//! 2. fetch open orders, positions, equity and, for buy/sell, the mark price
//! 3. compute an [`OperationPlan`]
//! 4. cancel every open order, tolerating individual failures
//! 5. submit the planned trades and report what the exchange said
//!
//! Nothing is remembered between signals.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{SignalError, Stage};
use crate::models::{
    AccountSnapshot, Action, CancelAck, CancelFailure, ExecutionReport, OperationPlan, OrderAck,
    PlannedTrade, ReportStatus, Signal, TradeOutcome,
};

use super::{AccountLocks, Exchange, PositionSizer, SignalValidator, SizingPolicy, TradingConfig};

pub struct Reconciler {
    exchange: Arc<dyn Exchange>,
    validator: SignalValidator,
    sizer: PositionSizer,
    config: TradingConfig,
    account: String,
    locks: Option<AccountLocks>,
}

impl Reconciler {
    /// Create an engine for `account`.
    ///
    /// `account` is the address whose state is queried; it may differ from the
    /// key that signs orders.
    pub fn new(
        exchange: Arc<dyn Exchange>,
        config: TradingConfig,
        account: String,
        secret: Option<String>,
    ) -> Self {
        let locks = config.serialize_signals.then(AccountLocks::new);
        Self {
            exchange,
            validator: SignalValidator::new(secret),
            sizer: PositionSizer::new(&config),
            config,
            account,
            locks,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn is_dry_run(&self) -> bool {
        self.exchange.is_dry_run()
    }

    pub fn requires_credential(&self) -> bool {
        self.validator.requires_credential()
    }

    /// Validate a raw payload and reconcile it.
    pub async fn handle_payload(&self, payload: &Value) -> Result<ExecutionReport, SignalError> {
        let signal = match self.validator.validate(payload) {
            Ok(signal) => signal,
            Err(e) => {
                let stage = match e {
                    SignalError::Unauthorized => Stage::Authenticated,
                    _ => Stage::Received,
                };
                warn!(stage = %stage, error = %e, "Signal refused");
                return Err(e);
            }
        };
        debug!(signal_id = %signal.id, stage = %Stage::Authenticated, "Signal accepted");

        self.handle(signal).await
    }

    /// Reconcile an already validated signal.
    pub async fn handle(&self, signal: Signal) -> Result<ExecutionReport, SignalError> {
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(&self.account).await),
            None => None,
        };

        info!(
            signal_id = %signal.id,
            action = %signal.action,
            account = %self.account,
            dry_run = self.is_dry_run(),
            "Processing signal"
        );

        let (snapshot, mark_price) = self.fetch_state(&signal).await?;
        let plan = self.reconcile(&signal, &snapshot, mark_price)?;
        self.execute(&signal, plan).await
    }

    /// Fetch the account snapshot and, for buy/sell, the mark price of the configured symbol.
    pub async fn fetch_state(
        &self,
        signal: &Signal,
    ) -> Result<(AccountSnapshot, Option<Decimal>), SignalError> {
        let open_orders = self
            .exchange
            .open_orders(&self.account)
            .await
            .map_err(|e| self.state_fetch_failed(signal, e))?;

        let state = self
            .exchange
            .account_state(&self.account)
            .await
            .map_err(|e| self.state_fetch_failed(signal, e))?;

        let mark_price = match signal.action {
            Action::Close => None,
            Action::Buy | Action::Sell => self
                .exchange
                .mark_price(&self.config.symbol)
                .await
                .map_err(|e| self.state_fetch_failed(signal, e))?,
        };

        let snapshot = AccountSnapshot::new(state, open_orders);
        debug!(
            signal_id = %signal.id,
            stage = %Stage::StateFetched,
            equity = ?snapshot.equity_value,
            positions = snapshot.positions.len(),
            open_orders = snapshot.open_orders.len(),
            mark_price = ?mark_price,
            "Account state fetched"
        );

        Ok((snapshot, mark_price))
    }

    /// Compute the operations that move `snapshot` to what `signal` asks for.
    ///
    /// Pure: no exchange access.
    pub fn reconcile(
        &self,
        signal: &Signal,
        snapshot: &AccountSnapshot,
        mark_price: Option<Decimal>,
    ) -> Result<OperationPlan, SignalError> {
        let trades = match signal.action.is_buy() {
            None => snapshot
                .open_positions()
                .map(|p| PlannedTrade::new(p.symbol.clone(), !p.is_long(), p.signed_size.abs()))
                .collect(),
            Some(is_buy) => {
                let target = self.sizer.target_size(snapshot.equity_value, mark_price)?;
                let current = snapshot.position_size(&self.config.symbol);
                self.entry_trade(is_buy, current, target).into_iter().collect()
            }
        };

        let plan = OperationPlan {
            cancellations: snapshot.open_orders.clone(),
            trades,
            reference_price: mark_price,
        };

        debug!(
            signal_id = %signal.id,
            stage = %Stage::PlanComputed,
            cancellations = plan.cancellations.len(),
            trades = ?plan.trades,
            "Plan computed"
        );

        Ok(plan)
    }

    /// Order that takes the configured symbol from `current` to a `target`-sized
    /// position in the signal direction.
    fn entry_trade(&self, is_buy: bool, current: Decimal, target: Decimal) -> Option<PlannedTrade> {
        let (is_buy, size) = match self.config.sizing_policy {
            // One order closes any existing exposure and opens the target in a
            // single exchange call. Same-direction positions are added to.
            SizingPolicy::Compound => (is_buy, target + current.abs()),
            SizingPolicy::Rebalance => {
                let desired = if is_buy { target } else { -target };
                let delta = desired - current;
                (delta > Decimal::ZERO, delta.abs())
            }
        };

        (!size.is_zero()).then(|| PlannedTrade::new(self.config.symbol.clone(), is_buy, size))
    }

    /// Run a plan: every cancellation, then every trade.
    pub async fn execute(
        &self,
        signal: &Signal,
        plan: OperationPlan,
    ) -> Result<ExecutionReport, SignalError> {
        debug!(signal_id = %signal.id, stage = %Stage::Cancelling, "Cancelling open orders");

        let mut cancelled = 0;
        let mut cancel_failures = Vec::new();

        for order in plan.cancellations {
            let reason = match self.exchange.cancel_order(&order.symbol, order.order_id).await {
                Ok(CancelAck::Ok) => {
                    cancelled += 1;
                    continue;
                }
                Ok(CancelAck::Error { message }) => message,
                Err(e) => format!("{:#}", e),
            };

            warn!(
                signal_id = %signal.id,
                symbol = %order.symbol,
                oid = order.order_id,
                reason = %reason,
                "Cancel failed, continuing"
            );
            cancel_failures.push(CancelFailure { order, reason });
        }

        debug!(signal_id = %signal.id, stage = %Stage::Trading, trades = plan.trades.len(), "Submitting trades");

        let mut outcomes = Vec::with_capacity(plan.trades.len());
        for trade in plan.trades {
            let ack = self
                .exchange
                .market_order(&trade.symbol, trade.is_buy, trade.size)
                .await
                .map_err(|e| {
                    error!(signal_id = %signal.id, symbol = %trade.symbol, error = %e, "Trade submission failed");
                    SignalError::transport(Stage::Trading, e)
                })?;

            let direction = trade.side();
            let outcome = match ack {
                OrderAck::Ok { order_id, avg_price, filled_size } => {
                    let price = avg_price.or(plan.reference_price);
                    info!(
                        signal_id = %signal.id,
                        symbol = %trade.symbol,
                        side = %direction,
                        size = %trade.size,
                        price = ?price,
                        filled = ?filled_size,
                        "Trade executed"
                    );
                    TradeOutcome::Executed {
                        symbol: trade.symbol,
                        direction,
                        size: trade.size,
                        price,
                        order_id,
                    }
                }
                OrderAck::Error { message } => {
                    warn!(
                        signal_id = %signal.id,
                        symbol = %trade.symbol,
                        side = %direction,
                        size = %trade.size,
                        reason = %message,
                        "Trade rejected by exchange"
                    );
                    TradeOutcome::Rejected {
                        symbol: trade.symbol,
                        direction,
                        size: trade.size,
                        reason: message,
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = ExecutionReport::new(
            signal.id,
            signal.action,
            cancelled,
            cancel_failures,
            outcomes,
            self.is_dry_run(),
        );

        if report.status == ReportStatus::Rejected {
            warn!(
                signal_id = %signal.id,
                stage = %Stage::Reported,
                cancelled = report.cancelled,
                partial_cancel_failure = report.partial_cancel_failure(),
                "Signal processed with rejected trades"
            );
        } else {
            info!(
                signal_id = %signal.id,
                stage = %Stage::Reported,
                status = ?report.status,
                cancelled = report.cancelled,
                partial_cancel_failure = report.partial_cancel_failure(),
                "Signal processed"
            );
        }

        Ok(report)
    }

    fn state_fetch_failed(&self, signal: &Signal, e: anyhow::Error) -> SignalError {
        error!(signal_id = %signal.id, error = %e, "Failed to fetch account state");
        SignalError::transport(Stage::StateFetched, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use crate::trading::mock::{Call, MockExchange};
    use rust_decimal_macros::dec;
    use serde_json::json;

    const ACCOUNT: &str = "0x00000000000000000000000000000000000000aa";

    fn engine(mock: Arc<MockExchange>) -> Reconciler {
        engine_with(mock, TradingConfig::default(), None)
    }

    fn engine_with(mock: Arc<MockExchange>, config: TradingConfig, secret: Option<&str>) -> Reconciler {
        Reconciler::new(mock, config, ACCOUNT.to_string(), secret.map(str::to_string))
    }

    fn funded() -> MockExchange {
        MockExchange::new()
            .with_equity(dec!(1000))
            .with_price("ETH", dec!(2000))
    }

    #[tokio::test]
    async fn test_unsupported_action_makes_no_calls() {
        let mock = Arc::new(funded());
        let engine = engine(mock.clone());

        let err = engine.handle_payload(&json!({ "action": "yolo" })).await.unwrap_err();

        assert!(matches!(err, SignalError::InvalidSignal(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_credential_makes_no_calls() {
        let mock = Arc::new(funded().with_order("ETH", 1));
        let engine = engine_with(mock.clone(), TradingConfig::default(), Some("s3cret"));

        let err = engine
            .handle_payload(&json!({ "action": "buy", "password": "guess" }))
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::Unauthorized));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_close_when_flat_is_no_change() {
        let mock = Arc::new(funded().with_position("ETH", Decimal::ZERO));
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "close" })).await.unwrap();

        assert_eq!(report.status, ReportStatus::NoPositionChange);
        assert!(report.trades.is_empty());
        assert!(mock.market_orders().is_empty());
    }

    #[tokio::test]
    async fn test_close_long_sells_full_size() {
        let mock = Arc::new(funded().with_position("ETH", dec!(2.5)));
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "close" })).await.unwrap();

        assert_eq!(mock.market_orders(), vec![("ETH".to_string(), false, dec!(2.5))]);
        assert_eq!(report.status, ReportStatus::Executed);
        // Close never needs a price
        assert!(!mock.calls().iter().any(|c| matches!(c, Call::MarkPrice(_))));
    }

    #[tokio::test]
    async fn test_close_every_open_position() {
        let mock = Arc::new(
            funded()
                .with_position("ETH", dec!(-1.2))
                .with_position("BTC", dec!(0.05))
                .with_position("SOL", Decimal::ZERO),
        );
        let engine = engine(mock.clone());

        engine.handle_payload(&json!({ "action": "close" })).await.unwrap();

        assert_eq!(
            mock.market_orders(),
            vec![
                ("ETH".to_string(), true, dec!(1.2)),
                ("BTC".to_string(), false, dec!(0.05)),
            ]
        );
    }

    #[tokio::test]
    async fn test_buy_from_flat() {
        let mock = Arc::new(funded());
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "buy" })).await.unwrap();

        assert_eq!(mock.market_orders(), vec![("ETH".to_string(), true, dec!(0.49))]);
        assert_eq!(
            report.trades,
            vec![TradeOutcome::Executed {
                symbol: "ETH".to_string(),
                direction: Side::Buy,
                size: dec!(0.49),
                price: Some(dec!(2000)),
                order_id: Some(1),
            }]
        );
    }

    #[tokio::test]
    async fn test_sell_flips_long_in_one_order() {
        let mock = Arc::new(funded().with_position("ETH", dec!(0.49)));
        let engine = engine(mock.clone());

        engine.handle_payload(&json!({ "action": "sell" })).await.unwrap();

        assert_eq!(mock.market_orders(), vec![("ETH".to_string(), false, dec!(0.98))]);
    }

    #[tokio::test]
    async fn test_compound_adds_to_same_direction() {
        let mock = Arc::new(funded().with_position("ETH", dec!(0.49)));
        let engine = engine(mock.clone());

        engine.handle_payload(&json!({ "action": "buy" })).await.unwrap();

        assert_eq!(mock.market_orders(), vec![("ETH".to_string(), true, dec!(0.98))]);
    }

    #[tokio::test]
    async fn test_rebalance_tops_up_or_trims() {
        let config = TradingConfig {
            sizing_policy: SizingPolicy::Rebalance,
            ..Default::default()
        };

        // Already at target: nothing to do
        let mock = Arc::new(funded().with_position("ETH", dec!(0.49)));
        let report = engine_with(mock.clone(), config.clone(), None)
            .handle_payload(&json!({ "action": "buy" }))
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::NoPositionChange);
        assert!(mock.market_orders().is_empty());

        // Oversized long: trim the excess
        let mock = Arc::new(funded().with_position("ETH", dec!(1.0)));
        engine_with(mock.clone(), config.clone(), None)
            .handle_payload(&json!({ "action": "buy" }))
            .await
            .unwrap();
        assert_eq!(mock.market_orders(), vec![("ETH".to_string(), false, dec!(0.51))]);

        // Opposing position: same as compound
        let mock = Arc::new(funded().with_position("ETH", dec!(-0.49)));
        engine_with(mock.clone(), config, None)
            .handle_payload(&json!({ "action": "buy" }))
            .await
            .unwrap();
        assert_eq!(mock.market_orders(), vec![("ETH".to_string(), true, dec!(0.98))]);
    }

    #[tokio::test]
    async fn test_cancels_all_before_trading_even_when_one_fails() {
        let mock = Arc::new(
            funded()
                .with_order("BTC", 11)
                .with_order("SOL", 12)
                .failing_cancel(11),
        );
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "sell" })).await.unwrap();

        assert_eq!(
            mock.writes(),
            vec![
                Call::Cancel("BTC".to_string(), 11),
                Call::Cancel("SOL".to_string(), 12),
                Call::MarketOrder {
                    symbol: "ETH".to_string(),
                    is_buy: false,
                    size: dec!(0.49),
                },
            ]
        );
        assert_eq!(report.cancelled, 1);
        assert!(report.partial_cancel_failure());
        assert_eq!(report.cancel_failures[0].order.order_id, 11);
        assert_eq!(report.status, ReportStatus::Executed);
    }

    #[tokio::test]
    async fn test_cancel_error_status_is_recorded() {
        let mock = Arc::new(funded().with_order("ETH", 5).rejected_cancel(5));
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "close" })).await.unwrap();

        assert_eq!(report.cancel_failures.len(), 1);
        assert!(report.cancel_failures[0].reason.contains("never placed"));
        assert_eq!(report.status, ReportStatus::NoPositionChange);
    }

    #[tokio::test]
    async fn test_close_also_cancels_orders() {
        let mock = Arc::new(funded().with_order("ETH", 3));
        let engine = engine(mock.clone());

        engine.handle_payload(&json!({ "action": "close" })).await.unwrap();

        assert_eq!(mock.writes(), vec![Call::Cancel("ETH".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_rejected_trade_is_reported_not_retried() {
        let mock = Arc::new(funded().rejecting_orders("Insufficient margin to place order."));
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "buy" })).await.unwrap();

        assert_eq!(report.status, ReportStatus::Rejected);
        assert_eq!(report.rejection(), Some("Insufficient margin to place order."));
        assert_eq!(mock.market_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_close_keeps_going_after_rejection() {
        let mock = Arc::new(
            funded()
                .with_position("ETH", dec!(0.5))
                .with_position("BTC", dec!(-0.1))
                .rejecting_orders("Order could not immediately match"),
        );
        let engine = engine(mock.clone());

        let report = engine.handle_payload(&json!({ "action": "close" })).await.unwrap();

        assert_eq!(mock.market_orders().len(), 2);
        assert_eq!(report.trades.len(), 2);
        assert_eq!(report.status, ReportStatus::Rejected);
    }

    #[tokio::test]
    async fn test_missing_price_aborts_before_any_write() {
        let mock = Arc::new(MockExchange::new().with_equity(dec!(1000)).with_order("ETH", 9));
        let engine = engine(mock.clone());

        let err = engine.handle_payload(&json!({ "action": "buy" })).await.unwrap_err();

        assert!(matches!(err, SignalError::PricingUnavailable(_)));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_buy_too_small_to_trade_is_an_error() {
        let mock = Arc::new(
            MockExchange::new()
                .with_equity(dec!(0.0001))
                .with_price("ETH", dec!(2000))
                .with_order("ETH", 8),
        );
        let engine = engine(mock.clone());

        let err = engine.handle_payload(&json!({ "action": "buy" })).await.unwrap_err();

        assert!(matches!(err, SignalError::PricingUnavailable(_)));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_leverage_does_not_panic() {
        let config = TradingConfig {
            leverage: dec!(100000000000000000000),
            ..Default::default()
        };
        let mock = Arc::new(
            MockExchange::new()
                .with_equity(dec!(100000000000))
                .with_price("ETH", dec!(2000)),
        );

        let err = engine_with(mock.clone(), config, None)
            .handle_payload(&json!({ "action": "buy" }))
            .await
            .unwrap_err();

        assert!(matches!(err, SignalError::PricingUnavailable(_)));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_state_fetch_failure_is_transport_error() {
        let mock = Arc::new(funded().failing_state());
        let engine = engine(mock.clone());

        let err = engine.handle_payload(&json!({ "action": "buy" })).await.unwrap_err();

        assert!(matches!(err, SignalError::Transport { stage: Stage::StateFetched, .. }));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_trade_transport_failure_after_cancels() {
        let mock = Arc::new(funded().with_order("ETH", 4).failing_orders());
        let engine = engine(mock.clone());

        let err = engine.handle_payload(&json!({ "action": "buy" })).await.unwrap_err();

        assert!(matches!(err, SignalError::Transport { stage: Stage::Trading, .. }));
        assert_eq!(mock.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_buy_is_not_deduplicated() {
        // The mock account stays flat, so each buy is a fresh entry
        let mock = Arc::new(funded());
        let engine = engine(mock.clone());

        engine.handle_payload(&json!({ "action": "buy" })).await.unwrap();
        engine.handle_payload(&json!({ "action": "buy" })).await.unwrap();

        assert_eq!(
            mock.market_orders(),
            vec![
                ("ETH".to_string(), true, dec!(0.49)),
                ("ETH".to_string(), true, dec!(0.49)),
            ]
        );
    }

    #[tokio::test]
    async fn test_state_is_queried_for_configured_account() {
        let mock = Arc::new(funded());
        let engine = engine(mock.clone());

        engine.handle_payload(&json!({ "action": "buy" })).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0], Call::OpenOrders(ACCOUNT.to_string()));
        assert_eq!(calls[1], Call::AccountState(ACCOUNT.to_string()));
        assert_eq!(calls[2], Call::MarkPrice("ETH".to_string()));
    }

    #[test]
    fn test_reconcile_is_pure() {
        let mock = Arc::new(MockExchange::new());
        let engine = engine(mock.clone());
        let snapshot = AccountSnapshot {
            equity_value: Some(dec!(1000)),
            positions: vec![],
            open_orders: vec![],
        };

        let plan = engine
            .reconcile(&Signal::new(Action::Buy), &snapshot, Some(dec!(2000)))
            .unwrap();

        assert_eq!(plan.trades, vec![PlannedTrade::new("ETH", true, dec!(0.49))]);
        assert!(mock.calls().is_empty());
    }
}
