//! Error types for the autopilot

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Transient network error: {0}")]
    Transient(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Risk limit: {0}")]
    RiskLimit(String),

    #[error("Order placement failed: {0}")]
    Execution(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Whether the failure is worth retrying with backoff.
    ///
    /// Timeouts, refused connections, 5xx and 429 responses count as transient.
    /// Everything else (bad payloads, auth, validation) fails fast.
    pub fn is_transient(&self) -> bool {
        match self {
            BotError::Transient(_) => true,
            BotError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                e.status()
                    .map(|s| s.is_server_error() || s.as_u16() == 429)
                    .unwrap_or(false)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
