//! Observable session state.

use alloy::primitives::Address;
use tradekey_core::{SessionStep, TradingSession};

use crate::error::SessionError;

/// Snapshot of one EOA's provisioning state.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub step: SessionStep,
    /// Last failure; cleared when a new run starts.
    pub error: Option<SessionError>,
    /// Latest known session, including partially provisioned ones.
    pub session: Option<TradingSession>,
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        self.step == SessionStep::Complete
            && self
                .session
                .as_ref()
                .is_some_and(TradingSession::is_complete)
    }
}

/// Broadcast whenever an EOA's step changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTransition {
    pub eoa: Address,
    pub from: SessionStep,
    pub to: SessionStep,
}
