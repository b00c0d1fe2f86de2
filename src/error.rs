//! Errors surfaced while handling a signal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Stage of signal processing, used to tag where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticated,
    StateFetched,
    PlanComputed,
    Cancelling,
    Trading,
    Reported,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Authenticated => "authenticated",
            Stage::StateFetched => "state fetch",
            Stage::PlanComputed => "planning",
            Stage::Cancelling => "cancelling",
            Stage::Trading => "trading",
            Stage::Reported => "reported",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SignalError {
    /// Malformed payload or unsupported action
    #[error("{0}")]
    InvalidSignal(String),

    /// Credential did not match the configured secret
    #[error("unauthorized")]
    Unauthorized,

    /// Price or equity missing or not positive
    #[error("pricing unavailable: {0}")]
    PricingUnavailable(String),

    /// Trade submission returned a non-ok status
    #[error("exchange rejected order: {0}")]
    ExchangeRejected(String),

    /// An exchange call itself failed
    #[error("exchange call failed during {stage}: {source:#}")]
    Transport {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

impl SignalError {
    pub fn unsupported_action() -> Self {
        SignalError::InvalidSignal("unsupported action".to_string())
    }

    pub fn transport(stage: Stage, source: anyhow::Error) -> Self {
        SignalError::Transport { stage, source }
    }

    /// HTTP status reported to the webhook caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SignalError::InvalidSignal(_) => StatusCode::BAD_REQUEST,
            SignalError::Unauthorized => StatusCode::UNAUTHORIZED,
            SignalError::PricingUnavailable(_)
            | SignalError::ExchangeRejected(_)
            | SignalError::Transport { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SignalError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}
