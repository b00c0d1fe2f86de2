//! Request and response types for the Hyperliquid REST API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{AccountState, OrderEntry, PositionEntry};

/// Body of a POST to `/info`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    OpenOrders { user: String },
    ClearinghouseState { user: String },
    AllMids,
    Meta,
}

/// Resting order from `openOrders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderResponse {
    pub coin: String,
    pub oid: u64,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub limit_px: Option<Decimal>,
    #[serde(default)]
    pub sz: Option<Decimal>,
}

impl From<OpenOrderResponse> for OrderEntry {
    fn from(o: OpenOrderResponse) -> Self {
        OrderEntry::new(o.coin, o.oid)
    }
}

/// Perpetuals account summary from `clearinghouseState`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub margin_summary: MarginSummary,
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
    #[serde(default)]
    pub withdrawable: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
    #[serde(default)]
    pub total_ntl_pos: Option<Decimal>,
    #[serde(default)]
    pub total_margin_used: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed size: positive long, negative short
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    #[serde(default)]
    pub unrealized_pnl: Option<Decimal>,
}

impl From<ClearinghouseState> for AccountState {
    fn from(state: ClearinghouseState) -> Self {
        AccountState {
            equity_value: Some(state.margin_summary.account_value),
            positions: state
                .asset_positions
                .into_iter()
                .map(|p| PositionEntry::new(p.position.coin, p.position.szi))
                .collect(),
        }
    }
}

/// Perpetuals universe from `meta`.
#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetMeta>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMeta {
    pub name: String,
    pub sz_decimals: u32,
}

/// Signed action sent to `/exchange`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExchangeAction {
    Order(BulkOrder),
    Cancel(BulkCancel),
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOrder {
    pub orders: Vec<OrderWire>,
    pub grouping: String,
}

/// Field names and order follow the exchange's msgpack layout.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "b")]
    pub is_buy: bool,
    #[serde(rename = "p")]
    pub limit_px: String,
    #[serde(rename = "s")]
    pub sz: String,
    #[serde(rename = "r")]
    pub reduce_only: bool,
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTypeWire {
    pub limit: LimitWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitWire {
    pub tif: String,
}

impl OrderTypeWire {
    /// Immediate-or-cancel limit, used to emulate market orders.
    pub fn ioc() -> Self {
        Self {
            limit: LimitWire {
                tif: "Ioc".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkCancel {
    pub cancels: Vec<CancelWire>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

/// ECDSA signature in the exchange's `{r, s, v}` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureWire {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Request body for `/exchange`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePayload {
    pub action: ExchangeAction,
    pub nonce: u64,
    pub signature: SignatureWire,
    pub vault_address: Option<String>,
}

/// Response from `/exchange`. `response` is a string on error, an object on success.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    #[serde(default)]
    pub response: Value,
}

impl ExchangeResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Per-request statuses under `response.data.statuses`.
    pub fn statuses(&self) -> &[Value] {
        self.response
            .pointer("/data/statuses")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Error text of a non-ok response.
    pub fn error_message(&self) -> String {
        match &self.response {
            Value::String(s) => s.clone(),
            Value::Null => format!("status {}", self.status),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_info_request_shape() {
        let body = serde_json::to_value(InfoRequest::ClearinghouseState {
            user: "0xabc".to_string(),
        })
        .unwrap();
        assert_eq!(body, json!({ "type": "clearinghouseState", "user": "0xabc" }));

        let body = serde_json::to_value(InfoRequest::AllMids).unwrap();
        assert_eq!(body, json!({ "type": "allMids" }));
    }

    #[test]
    fn test_clearinghouse_state_into_account() {
        let raw = json!({
            "marginSummary": {
                "accountValue": "1000.5",
                "totalNtlPos": "980.0",
                "totalRawUsd": "20.5",
                "totalMarginUsed": "98.0"
            },
            "crossMarginSummary": { "accountValue": "1000.5" },
            "withdrawable": "902.5",
            "assetPositions": [
                {
                    "type": "oneWay",
                    "position": {
                        "coin": "ETH",
                        "szi": "-0.49",
                        "entryPx": "2000.1",
                        "unrealizedPnl": "-1.2",
                        "leverage": { "type": "cross", "value": 20 }
                    }
                }
            ]
        });

        let state: ClearinghouseState = serde_json::from_value(raw).unwrap();
        let account = AccountState::from(state);

        assert_eq!(account.equity_value, Some(dec!(1000.5)));
        assert_eq!(account.positions, vec![PositionEntry::new("ETH", dec!(-0.49))]);
    }

    #[test]
    fn test_open_order_into_entry() {
        let raw = json!([{ "coin": "BTC", "limitPx": "29792.0", "oid": 91490942, "side": "A", "sz": "0.0", "timestamp": 1681247412573u64 }]);
        let orders: Vec<OpenOrderResponse> = serde_json::from_value(raw).unwrap();
        let entry = OrderEntry::from(orders[0].clone());

        assert_eq!(entry, OrderEntry::new("BTC", 91490942));
    }

    #[test]
    fn test_error_response_message() {
        let resp: ExchangeResponse =
            serde_json::from_value(json!({ "status": "err", "response": "User or API Wallet does not exist." })).unwrap();

        assert!(!resp.is_ok());
        assert!(resp.statuses().is_empty());
        assert_eq!(resp.error_message(), "User or API Wallet does not exist.");
    }
}
