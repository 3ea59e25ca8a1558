//! Session error types.

use thiserror::Error;
use tradekey_auth::AuthError;
use tradekey_chain::{ApprovalError, DeploymentError, DerivationError};
use tradekey_core::SessionStep;

/// Failure of one initialization run.
///
/// Cloneable so concurrent callers sharing a run each receive it.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("The {step} step did not finish within {timeout_ms} ms. Try again.")]
    Timeout { step: SessionStep, timeout_ms: u64 },

    #[error("Unexpected error during session setup: {0}")]
    Unexpected(String),

    #[error("The session was ended while setup was still running")]
    Superseded,
}

impl SessionError {
    /// Whether retrying the same call may succeed without user action.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Deployment(DeploymentError::Network(_)) => true,
            Self::Auth(AuthError::Exhausted { .. }) => true,
            _ => false,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_step() {
        let err = SessionError::Timeout {
            step: SessionStep::Deploying,
            timeout_ms: 1500,
        };
        assert_eq!(
            err.to_string(),
            "The deploying step did not finish within 1500 ms. Try again."
        );
        assert!(err.is_transient());
    }

    #[test]
    fn test_network_message_passes_through() {
        let err: SessionError = DeploymentError::Network("dns".to_string()).into();
        assert!(err.to_string().contains("Check your network connection"));
        assert!(err.is_transient());
    }

    #[test]
    fn test_superseded_not_transient() {
        assert!(!SessionError::Superseded.is_transient());
    }

    #[test]
    fn test_derivation_not_transient() {
        let err: SessionError = DerivationError::ZeroAddress.into();
        assert!(!err.is_transient());
    }
}
