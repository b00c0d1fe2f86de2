//! Hyperliquid `/info` client for account state and market data (read-only).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::{AccountState, CancelAck, OrderAck, OrderEntry, OrderId};
use crate::trading::Exchange;

use super::types::*;

pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Hyperliquid info endpoint.
#[derive(Clone)]
pub struct InfoClient {
    client: Client,
    base_url: String,
}

impl InfoClient {
    /// Create a client against `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resting orders for `user`, as returned by the exchange.
    pub async fn open_order_details(&self, user: &str) -> Result<Vec<OpenOrderResponse>> {
        self.post(&InfoRequest::OpenOrders {
            user: user.to_string(),
        })
        .await
        .context("Failed to fetch open orders")
    }

    /// Resting orders for `user`.
    pub async fn open_orders(&self, user: &str) -> Result<Vec<OrderEntry>> {
        let orders = self.open_order_details(user).await?;
        Ok(orders.into_iter().map(OrderEntry::from).collect())
    }

    /// Raw perpetuals account summary for `user`.
    pub async fn clearinghouse_state(&self, user: &str) -> Result<ClearinghouseState> {
        self.post(&InfoRequest::ClearinghouseState {
            user: user.to_string(),
        })
        .await
        .context("Failed to fetch clearinghouse state")
    }

    /// Equity and positions for `user`.
    pub async fn account_state(&self, user: &str) -> Result<AccountState> {
        Ok(self.clearinghouse_state(user).await?.into())
    }

    /// Mid prices of every listed coin.
    pub async fn all_mids(&self) -> Result<HashMap<String, Decimal>> {
        self.post(&InfoRequest::AllMids)
            .await
            .context("Failed to fetch mid prices")
    }

    /// Mid price of one coin, `None` if it is not quoted.
    pub async fn mid_price(&self, coin: &str) -> Result<Option<Decimal>> {
        Ok(self.all_mids().await?.get(coin).copied())
    }

    /// Perpetuals universe (asset indices and size decimals).
    pub async fn meta(&self) -> Result<Meta> {
        self.post(&InfoRequest::Meta)
            .await
            .context("Failed to fetch exchange metadata")
    }

    async fn post<T: DeserializeOwned>(&self, request: &InfoRequest) -> Result<T> {
        let url = format!("{}/info", self.base_url);
        debug!(url = %url, request = ?request, "Info request");

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Info request failed: {} - {}", status, body);
        }

        response.json().await.context("Failed to parse info response")
    }
}

/// Read-only exchange: enough for dry runs without a signing key.
#[async_trait]
impl Exchange for InfoClient {
    async fn open_orders(&self, account: &str) -> Result<Vec<OrderEntry>> {
        InfoClient::open_orders(self, account).await
    }

    async fn account_state(&self, account: &str) -> Result<AccountState> {
        InfoClient::account_state(self, account).await
    }

    async fn mark_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        self.mid_price(symbol).await
    }

    async fn cancel_order(&self, _symbol: &str, order_id: OrderId) -> Result<CancelAck> {
        bail!("Cannot cancel order {} without a signing key", order_id)
    }

    async fn market_order(&self, symbol: &str, _is_buy: bool, _size: Decimal) -> Result<OrderAck> {
        bail!("Cannot submit {} order without a signing key", symbol)
    }
}
