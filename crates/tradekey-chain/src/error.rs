//! Chain, relay, approval and deployment error types.

use alloy::primitives::Address;
use thiserror::Error;

/// Read-only chain access errors.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Failed to decode call result: {0}")]
    Decode(String),
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Relayed transaction errors.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// Connectivity class: DNS, connect, transport timeout.
    #[error("Relay unreachable: {0}")]
    Network(String),

    #[error("Relay rejected request: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Relayed transaction {transaction_id} failed in state {state}")]
    TransactionFailed {
        transaction_id: String,
        state: String,
    },

    #[error("Relayed transaction {0} not confirmed after polling")]
    ConfirmationTimeout(String),

    #[error("Failed to decode relay response: {0}")]
    Decode(String),
}

impl RelayError {
    /// True for connectivity failures rather than relay-side rejections.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, RelayError::Network(_))
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            RelayError::Network(e.to_string())
        } else if e.is_decode() {
            RelayError::Decode(e.to_string())
        } else {
            RelayError::Rejected {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                body: e.to_string(),
            }
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Smart-wallet address derivation errors.
#[derive(Debug, Clone, Error)]
pub enum DerivationError {
    #[error("Cannot derive a smart wallet for the zero address")]
    ZeroAddress,
}

/// Approval check and submission errors.
#[derive(Debug, Clone, Error)]
pub enum ApprovalError {
    #[error("Failed to read approval {label}: {source}")]
    Read {
        label: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("Approval transactions could not be submitted ({count} pending)")]
    SubmissionFailed { count: usize },
}

/// Deployment errors.
#[derive(Debug, Clone, Error)]
pub enum DeploymentError {
    #[error("Deployment status check failed: {0}")]
    CheckFailed(RelayError),

    #[error("Could not reach the relay service. Check your network connection and try again ({0})")]
    Network(String),

    #[error("Deployment request failed: {0}")]
    Relay(RelayError),

    #[error("Relay deployed {actual}, expected smart wallet {expected}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("Smart wallet {0} is still not deployed after the relay reported success")]
    NotConfirmed(Address),
}

impl From<RelayError> for DeploymentError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Network(msg) => DeploymentError::Network(msg),
            other => DeploymentError::Relay(other),
        }
    }
}
