//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Key error: {0}")]
    Key(#[from] tradekey_auth::KeyError),

    #[error("Chain error: {0}")]
    Chain(#[from] tradekey_chain::ChainError),

    #[error("Relay error: {0}")]
    Relay(#[from] tradekey_chain::RelayError),

    #[error("Venue error: {0}")]
    Venue(#[from] tradekey_auth::VenueError),

    #[error("Approval error: {0}")]
    Approval(#[from] tradekey_chain::ApprovalError),

    #[error("Store error: {0}")]
    Store(#[from] tradekey_store::StoreError),

    #[error("{0}")]
    Session(#[from] tradekey_session::SessionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tradekey_telemetry::TelemetryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<tradekey_core::CoreError> for AppError {
    fn from(e: tradekey_core::CoreError) -> Self {
        AppError::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
