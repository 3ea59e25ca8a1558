//! Trading session aggregate and provisioning cursor.

use std::fmt;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};

use crate::credentials::ApiCredentials;

/// Provisioning step of an in-flight session initialization.
///
/// Held in memory only; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionStep {
    #[default]
    Idle,
    Checking,
    Deploying,
    Credentials,
    Approvals,
    Complete,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Deploying => "deploying",
            Self::Credentials => "credentials",
            Self::Approvals => "approvals",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioned trading identity for one EOA.
///
/// `has_api_credentials()` is derived from the stored credentials, so a
/// session can never claim credentials it does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingSession {
    pub eoa_address: Address,
    pub safe_address: Address,
    pub is_safe_deployed: bool,
    pub has_approvals: bool,
    api_credentials: Option<ApiCredentials>,
    pub last_checked: DateTime<Utc>,
}

impl TradingSession {
    /// Fresh session with nothing provisioned.
    pub fn new(eoa_address: Address, safe_address: Address, now: DateTime<Utc>) -> Self {
        Self {
            eoa_address,
            safe_address,
            is_safe_deployed: false,
            has_approvals: false,
            api_credentials: None,
            last_checked: now,
        }
    }

    /// Attach credentials. Structurally invalid credentials are dropped.
    pub fn set_credentials(&mut self, credentials: ApiCredentials) {
        self.api_credentials = credentials.is_valid().then_some(credentials);
    }

    pub fn clear_credentials(&mut self) {
        self.api_credentials = None;
    }

    pub fn api_credentials(&self) -> Option<&ApiCredentials> {
        self.api_credentials.as_ref()
    }

    #[must_use]
    pub fn has_api_credentials(&self) -> bool {
        self.api_credentials.as_ref().is_some_and(ApiCredentials::is_valid)
    }

    /// Complete iff deployed, credentialed and approved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_safe_deployed && self.has_api_credentials() && self.has_approvals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> TradingSession {
        TradingSession::new(
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_session_is_empty() {
        let s = session();
        assert!(!s.is_safe_deployed);
        assert!(!s.has_api_credentials());
        assert!(!s.has_approvals);
        assert!(!s.is_complete());
    }

    #[test]
    fn test_invalid_credentials_are_not_attached() {
        let mut s = session();
        s.set_credentials(ApiCredentials::new("key", "", "pass"));
        assert!(!s.has_api_credentials());
        assert!(s.api_credentials().is_none());
    }

    #[test]
    fn test_complete_requires_all_flags() {
        let mut s = session();
        s.is_safe_deployed = true;
        s.has_approvals = true;
        assert!(!s.is_complete());

        s.set_credentials(ApiCredentials::new("key", "secret", "pass"));
        assert!(s.is_complete());

        s.has_approvals = false;
        assert!(!s.is_complete());
    }

    #[test]
    fn test_step_display() {
        assert_eq!(SessionStep::Idle.to_string(), "idle");
        assert_eq!(SessionStep::Credentials.to_string(), "credentials");
        assert_eq!(SessionStep::default(), SessionStep::Idle);
    }
}
