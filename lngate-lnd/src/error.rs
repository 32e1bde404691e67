use std::time::Duration;

use lngate_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum LndError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a non-success status. Whether the call is worth
    /// retrying (5xx) or not (4xx) is up to the caller.
    #[error("LND API error ({status}): {body}")]
    Gateway { status: u16, body: String },

    #[error("Invalid response from LND: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid amount {0}: invoices need a positive amount")]
    InvalidAmount(u64),

    #[error("Invalid hash encoding: {0}")]
    Encoding(#[from] CoreError),

    #[error("LND stream error: {0}")]
    Stream(String),

    #[error("LND stream idle for {0:?}")]
    IdleTimeout(Duration),
}

impl LndError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Gateway { status, .. } => Some(*status),
            _ => None,
        }
    }
}
