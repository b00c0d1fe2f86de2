//! Signal model representing one inbound trading instruction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action requested by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Close,
}

impl Action {
    /// Parse an action name case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            "close" => Some(Self::Close),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Close => "close",
        }
    }

    /// Order direction implied by an opening action. `None` for close.
    pub fn is_buy(&self) -> Option<bool> {
        match self {
            Action::Buy => Some(true),
            Action::Sell => Some(false),
            Action::Close => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated signal. Lives for the duration of one request.
#[derive(Debug, Clone)]
pub struct Signal {
    /// Correlation id for log lines of this reconciliation
    pub id: Uuid,

    /// Requested action
    pub action: Action,
}

impl Signal {
    pub fn new(action: Action) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
        }
    }
}
