//! Hyperliquid `/exchange` client for signed order actions.
//!
//! Hyperliquid has no native market order. Market orders are sent as
//! immediate-or-cancel limit orders priced a slippage band away from the mid,
//! the same way the official SDKs do it.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::models::{AccountState, CancelAck, OrderAck, OrderEntry, OrderId};
use crate::trading::Exchange;

use super::signing::sign_l1_action;
use super::types::*;
use super::InfoClient;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Significant figures allowed in a perp price.
const PRICE_SIG_FIGS: u32 = 5;
/// Decimal places available to perp prices before subtracting `szDecimals`.
const MAX_PERP_DECIMALS: u32 = 6;

/// Index and size precision of a listed perp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetInfo {
    pub index: u32,
    pub sz_decimals: u32,
}

/// Signing client for order placement and cancellation.
pub struct ExchangeClient {
    http: Client,
    signer: PrivateKeySigner,
    info: InfoClient,
    is_mainnet: bool,
    slippage: Decimal,
    assets: OnceCell<HashMap<String, AssetInfo>>,
}

impl ExchangeClient {
    /// Create a new exchange client.
    ///
    /// # Arguments
    /// * `private_key` - Signing key (hex string, with or without 0x prefix).
    ///   May be an API wallet authorized for another account.
    /// * `info` - Info client pointed at the same network
    /// * `is_mainnet` - Selects the phantom agent source used in signatures
    /// * `slippage` - Price band for IOC market orders (0.05 = 5%)
    pub fn new(private_key: &str, info: InfoClient, is_mainnet: bool, slippage: Decimal) -> Result<Self> {
        let pk = private_key.strip_prefix("0x").unwrap_or(private_key);
        let signer = PrivateKeySigner::from_str(pk).context("Invalid private key")?;

        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        Ok(Self {
            http,
            signer,
            info,
            is_mainnet,
            slippage,
            assets: OnceCell::new(),
        })
    }

    /// Address of the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Look up a coin's asset index and size decimals. Metadata is fetched once.
    pub async fn asset(&self, coin: &str) -> Result<AssetInfo> {
        let assets = self
            .assets
            .get_or_try_init(|| async {
                let meta = self.info.meta().await?;
                Ok::<_, anyhow::Error>(index_universe(&meta))
            })
            .await?;

        assets
            .get(coin)
            .copied()
            .ok_or_else(|| anyhow!("Unknown asset: {}", coin))
    }

    /// Open or extend a position with an IOC order at mid ± slippage.
    pub async fn market_open(&self, coin: &str, is_buy: bool, size: Decimal) -> Result<OrderAck> {
        let asset = self.asset(coin).await?;
        let mid = self
            .info
            .mid_price(coin)
            .await?
            .ok_or_else(|| anyhow!("No mid price for {}", coin))?;

        let limit_px = slippage_price(mid, is_buy, self.slippage, asset.sz_decimals);
        let sz = size.round_dp(asset.sz_decimals);
        if sz.is_zero() {
            return Ok(OrderAck::Error {
                message: format!("Order size {} rounds to zero for {}", size, coin),
            });
        }

        let action = ExchangeAction::Order(BulkOrder {
            orders: vec![OrderWire {
                asset: asset.index,
                is_buy,
                limit_px: decimal_to_wire(limit_px),
                sz: decimal_to_wire(sz),
                reduce_only: false,
                order_type: OrderTypeWire::ioc(),
            }],
            grouping: "na".to_string(),
        });

        info!(coin = %coin, is_buy = is_buy, size = %sz, limit_px = %limit_px, "Submitting IOC order");

        let response = self.post_action(action).await?;
        Ok(parse_order_response(&response))
    }

    /// Cancel a resting order.
    pub async fn cancel(&self, coin: &str, oid: OrderId) -> Result<CancelAck> {
        let asset = self.asset(coin).await?;
        let action = ExchangeAction::Cancel(BulkCancel {
            cancels: vec![CancelWire {
                asset: asset.index,
                oid,
            }],
        });

        let response = self.post_action(action).await?;
        Ok(parse_cancel_response(&response))
    }

    /// Sign and submit an action.
    async fn post_action(&self, action: ExchangeAction) -> Result<ExchangeResponse> {
        let nonce = Utc::now().timestamp_millis() as u64;
        let signature = sign_l1_action(&self.signer, &action, nonce, self.is_mainnet).await?;

        let payload = ExchangePayload {
            action,
            nonce,
            signature,
            vault_address: None,
        };

        let url = format!("{}/exchange", self.info.base_url());
        debug!(url = %url, nonce = nonce, "Posting exchange action");

        let resp = self.http.post(&url).json(&payload).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Exchange request failed: {} - {}", status, text));
        }

        resp.json().await.context("Failed to parse exchange response")
    }
}

#[async_trait]
impl Exchange for ExchangeClient {
    async fn open_orders(&self, account: &str) -> Result<Vec<OrderEntry>> {
        self.info.open_orders(account).await
    }

    async fn account_state(&self, account: &str) -> Result<AccountState> {
        self.info.account_state(account).await
    }

    async fn mark_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        self.info.mid_price(symbol).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: OrderId) -> Result<CancelAck> {
        self.cancel(symbol, order_id).await
    }

    async fn market_order(&self, symbol: &str, is_buy: bool, size: Decimal) -> Result<OrderAck> {
        self.market_open(symbol, is_buy, size).await
    }
}

fn index_universe(meta: &Meta) -> HashMap<String, AssetInfo> {
    meta.universe
        .iter()
        .enumerate()
        .map(|(i, a)| {
            (
                a.name.clone(),
                AssetInfo {
                    index: i as u32,
                    sz_decimals: a.sz_decimals,
                },
            )
        })
        .collect()
}

/// Limit price for an IOC market order: 5 significant figures, then
/// `6 - szDecimals` decimal places.
fn slippage_price(mid: Decimal, is_buy: bool, slippage: Decimal, sz_decimals: u32) -> Decimal {
    let factor = if is_buy {
        Decimal::ONE + slippage
    } else {
        Decimal::ONE - slippage
    };

    let px = round_significant(mid * factor, PRICE_SIG_FIGS);
    px.round_dp(MAX_PERP_DECIMALS.saturating_sub(sz_decimals))
}

fn round_significant(value: Decimal, figures: u32) -> Decimal {
    if value.is_zero() {
        return value;
    }

    // Exponent of the leading digit
    let mut exponent: i32 = 0;
    let mut v = value.abs();
    while v >= Decimal::TEN {
        v /= Decimal::TEN;
        exponent += 1;
    }
    while v < Decimal::ONE {
        v *= Decimal::TEN;
        exponent -= 1;
    }

    let decimals = figures as i32 - 1 - exponent;
    if decimals >= 0 {
        value.round_dp(decimals as u32)
    } else {
        let scale = Decimal::from(10u64.pow((-decimals) as u32));
        (value / scale).round() * scale
    }
}

/// Canonical number string: at most 8 decimals, no trailing zeros.
fn decimal_to_wire(value: Decimal) -> String {
    let s = value.round_dp(8).normalize().to_string();
    if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

fn parse_order_response(response: &ExchangeResponse) -> OrderAck {
    if !response.is_ok() {
        return OrderAck::Error {
            message: response.error_message(),
        };
    }

    let Some(status) = response.statuses().first() else {
        return OrderAck::Ok {
            order_id: None,
            avg_price: None,
            filled_size: None,
        };
    };

    if let Some(error) = status.get("error").and_then(Value::as_str) {
        return OrderAck::Error {
            message: error.to_string(),
        };
    }

    if let Some(filled) = status.get("filled") {
        return OrderAck::Ok {
            order_id: filled.get("oid").and_then(Value::as_u64),
            avg_price: decimal_field(filled, "avgPx"),
            filled_size: decimal_field(filled, "totalSz"),
        };
    }

    OrderAck::Ok {
        order_id: status.pointer("/resting/oid").and_then(Value::as_u64),
        avg_price: None,
        filled_size: None,
    }
}

fn parse_cancel_response(response: &ExchangeResponse) -> CancelAck {
    if !response.is_ok() {
        return CancelAck::Error {
            message: response.error_message(),
        };
    }

    match response.statuses().first() {
        Some(status) => match status.get("error").and_then(Value::as_str) {
            Some(error) => CancelAck::Error {
                message: error.to_string(),
            },
            None => CancelAck::Ok,
        },
        None => CancelAck::Ok,
    }
}

fn decimal_field(value: &Value, field: &str) -> Option<Decimal> {
    value
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
}
