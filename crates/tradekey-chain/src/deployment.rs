//! Smart-wallet deployment.
//!
//! The relay reporting success is not proof of deployment: after the deploy
//! transaction settles, deployment is re-verified with an independent
//! `get_deployed` round-trip.

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::error::{DeploymentError, RelayError};
use crate::relay::RelayExecutor;

/// Deployment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Treat a failed deployment-status check as "deployed" (fail open).
    ///
    /// Avoids re-deploying accounts created through another channel when the
    /// relay is flaky, at the risk of masking a genuinely undeployed wallet.
    pub assume_deployed_on_check_failure: bool,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            assume_deployed_on_check_failure: true,
        }
    }
}

/// Checks and performs smart-wallet deployment through the relay.
#[derive(Debug, Clone, Default)]
pub struct DeploymentManager {
    config: DeploymentConfig,
}

impl DeploymentManager {
    pub fn new(config: DeploymentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DeploymentConfig {
        self.config
    }

    /// Whether `safe` is deployed.
    ///
    /// A failed check resolves to `Ok(true)` when failing open. Otherwise an
    /// unreachable relay is `DeploymentError::Network` and any other failure
    /// is `DeploymentError::CheckFailed`.
    pub async fn is_deployed(
        &self,
        executor: &dyn RelayExecutor,
        safe: Address,
    ) -> Result<bool, DeploymentError> {
        match executor.get_deployed(safe).await {
            Ok(deployed) => Ok(deployed),
            Err(e) if self.config.assume_deployed_on_check_failure => {
                warn!(
                    %safe,
                    error = %e,
                    "Deployment check failed, assuming deployed"
                );
                Ok(true)
            }
            Err(RelayError::Network(msg)) => Err(DeploymentError::Network(msg)),
            Err(e) => Err(DeploymentError::CheckFailed(e)),
        }
    }

    /// Deploy `safe` through the relay, wait for settlement, then verify.
    pub async fn deploy_and_verify(
        &self,
        executor: &dyn RelayExecutor,
        safe: Address,
    ) -> Result<(), DeploymentError> {
        info!(%safe, "Deploying smart wallet");

        let handle = executor.deploy().await?;
        if let Some(actual) = handle.proxy_address {
            if actual != safe {
                return Err(DeploymentError::AddressMismatch {
                    expected: safe,
                    actual,
                });
            }
        }

        let receipt = executor.wait(&handle).await?;
        info!(
            %safe,
            transaction_id = %receipt.transaction_id,
            state = %receipt.state,
            "Deployment transaction settled, verifying"
        );

        // Verification never fails open.
        let deployed = executor
            .get_deployed(safe)
            .await
            .map_err(DeploymentError::from)?;
        if !deployed {
            return Err(DeploymentError::NotConfirmed(safe));
        }

        info!(%safe, "Smart wallet deployment verified");
        Ok(())
    }
}
