use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::SignalError;
use crate::trading::Reconciler;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub symbol: String,
    pub dry_run: bool,
}

/// Static liveness payload.
pub async fn health(State(engine): State<Arc<Reconciler>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running",
        message: "Hyperliquid Webhook Server",
        symbol: engine.config().symbol.clone(),
        dry_run: engine.is_dry_run(),
    })
}

/// Accepts a trading signal and reconciles the account against it.
///
/// Bodies that are not JSON are treated as having no action, so they get a
/// 400 like any other unsupported signal.
pub async fn webhook(State(engine): State<Arc<Reconciler>>, body: Bytes) -> Response {
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    match engine.handle_payload(&payload).await {
        Ok(report) => match report.rejection() {
            Some(reason) => {
                let error = SignalError::ExchangeRejected(reason.to_string());
                let body = json!({ "error": error.to_string(), "result": report });
                (error.status_code(), Json(body)).into_response()
            }
            None => {
                let body = json!({ "status": "success", "action": report.action, "result": report });
                (StatusCode::OK, Json(body)).into_response()
            }
        },
        Err(e) => e.into_response(),
    }
}
