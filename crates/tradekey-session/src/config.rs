//! Session orchestration configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tradekey_chain::DeploymentConfig;

/// Session orchestration configuration (`[session]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Treat a failed deployment check as "deployed". Default: true.
    #[serde(default = "default_assume_deployed_on_check_failure")]
    pub assume_deployed_on_check_failure: bool,
    /// Deployment check, deploy and verify (ms). Default: 180,000.
    #[serde(default = "default_deploy_timeout_ms")]
    pub deploy_timeout_ms: u64,
    /// Credential derive-or-create (ms). Default: 60,000.
    #[serde(default = "default_credentials_timeout_ms")]
    pub credentials_timeout_ms: u64,
    /// Approval check and corrective batch (ms). Default: 180,000.
    #[serde(default = "default_approvals_timeout_ms")]
    pub approvals_timeout_ms: u64,
    /// Cached credentials are re-derived when the session's last completed
    /// run is older than this. Every successful run refreshes that time, so
    /// this bounds idle time rather than credential lifetime.
    /// Default: unset (never expire).
    #[serde(default)]
    pub credential_max_age_ms: Option<u64>,
}

fn default_assume_deployed_on_check_failure() -> bool {
    true
}

fn default_deploy_timeout_ms() -> u64 {
    180_000
}

fn default_credentials_timeout_ms() -> u64 {
    60_000
}

fn default_approvals_timeout_ms() -> u64 {
    180_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            assume_deployed_on_check_failure: default_assume_deployed_on_check_failure(),
            deploy_timeout_ms: default_deploy_timeout_ms(),
            credentials_timeout_ms: default_credentials_timeout_ms(),
            approvals_timeout_ms: default_approvals_timeout_ms(),
            credential_max_age_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn deployment_config(&self) -> DeploymentConfig {
        DeploymentConfig {
            assume_deployed_on_check_failure: self.assume_deployed_on_check_failure,
        }
    }

    pub fn deploy_timeout(&self) -> Duration {
        Duration::from_millis(self.deploy_timeout_ms)
    }

    pub fn credentials_timeout(&self) -> Duration {
        Duration::from_millis(self.credentials_timeout_ms)
    }

    pub fn approvals_timeout(&self) -> Duration {
        Duration::from_millis(self.approvals_timeout_ms)
    }
}
