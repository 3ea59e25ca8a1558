//! Token approval management.
//!
//! Reads the approval table for a smart wallet, builds the minimal set of
//! corrective transactions and submits them as one relayed batch.
//!
//! # Threshold semantics
//!
//! An ERC-20 allowance counts as approved iff `allowance >= threshold`, where
//! the default threshold is `2^255`. Infinite approvals (`U256::MAX`) clear it
//! comfortably; small or partially spent allowances do not.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use tracing::{debug, info, warn};
use tradekey_core::{ApprovalCheck, ApprovalKind, ApprovalRequirement, ApprovalStatus, ChainConfig};

use crate::contracts::{IERC1155, IERC20};
use crate::error::ApprovalError;
use crate::reader::ChainReader;
use crate::relay::{RelayCall, RelayExecutor};

/// Default ERC-20 allowance threshold (2^255).
pub const DEFAULT_ALLOWANCE_THRESHOLD: U256 = U256::from_limbs([0, 0, 0, 1 << 63]);

/// Description attached to the relayed approval batch.
const BATCH_DESCRIPTION: &str = "approve tokens for trading";

/// One corrective approval transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalTransaction {
    pub target: Address,
    pub calldata: Bytes,
    pub description: String,
    pub requirement: ApprovalRequirement,
}

impl ApprovalTransaction {
    fn for_requirement(req: &ApprovalRequirement) -> Self {
        let calldata = match req.kind {
            ApprovalKind::Erc20Allowance => IERC20::approveCall {
                spender: req.spender,
                amount: U256::MAX,
            }
            .abi_encode(),
            ApprovalKind::Erc1155ApprovalForAll => IERC1155::setApprovalForAllCall {
                operator: req.spender,
                approved: true,
            }
            .abi_encode(),
        };

        Self {
            target: req.token,
            calldata: Bytes::from(calldata),
            description: format!("approve {}", req.label),
            requirement: *req,
        }
    }

    fn to_relay_call(&self) -> RelayCall {
        RelayCall {
            to: self.target,
            data: self.calldata.clone(),
            value: U256::ZERO,
        }
    }
}

/// Approval checker and fixer for one chain's approval table.
#[derive(Debug, Clone)]
pub struct ApprovalManager {
    requirements: Vec<ApprovalRequirement>,
    threshold: U256,
}

impl ApprovalManager {
    pub fn new(chain: &ChainConfig) -> Self {
        Self {
            requirements: chain.approval_requirements(),
            threshold: DEFAULT_ALLOWANCE_THRESHOLD,
        }
    }

    /// Override the ERC-20 allowance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: U256) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> U256 {
        self.threshold
    }

    pub fn requirements(&self) -> &[ApprovalRequirement] {
        &self.requirements
    }

    /// Read every requirement for `safe` from chain, in table order.
    ///
    /// Always performs fresh reads.
    pub async fn check_all(
        &self,
        reader: &dyn ChainReader,
        safe: Address,
    ) -> Result<ApprovalStatus, ApprovalError> {
        let mut checks = Vec::with_capacity(self.requirements.len());

        for req in &self.requirements {
            let approved = match req.kind {
                ApprovalKind::Erc20Allowance => {
                    let allowance = reader
                        .erc20_allowance(req.token, safe, req.spender)
                        .await
                        .map_err(|source| ApprovalError::Read {
                            label: req.label,
                            source,
                        })?;
                    allowance >= self.threshold
                }
                ApprovalKind::Erc1155ApprovalForAll => reader
                    .is_approved_for_all(req.token, safe, req.spender)
                    .await
                    .map_err(|source| ApprovalError::Read {
                        label: req.label,
                        source,
                    })?,
            };

            debug!(%safe, requirement = req.label, approved, "Approval checked");
            checks.push(ApprovalCheck {
                requirement: *req,
                approved,
            });
        }

        let status = ApprovalStatus::new(checks);
        info!(
            %safe,
            all_approved = status.all_approved(),
            missing = status.missing_count(),
            "Approval check complete"
        );
        Ok(status)
    }

    /// Transactions fixing every unapproved requirement, in table order.
    #[must_use]
    pub fn build_corrective_transactions(
        &self,
        status: &ApprovalStatus,
    ) -> Vec<ApprovalTransaction> {
        status
            .missing()
            .map(ApprovalTransaction::for_requirement)
            .collect()
    }

    /// Submit all transactions as one relayed batch and wait for it.
    ///
    /// Returns false on any relay failure; never errors.
    pub async fn submit_all(
        &self,
        executor: &dyn RelayExecutor,
        transactions: &[ApprovalTransaction],
    ) -> bool {
        if transactions.is_empty() {
            return true;
        }

        let calls: Vec<RelayCall> = transactions
            .iter()
            .map(ApprovalTransaction::to_relay_call)
            .collect();

        let handle = match executor.execute(calls, BATCH_DESCRIPTION.to_string()).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, count = transactions.len(), "Approval batch submission failed");
                return false;
            }
        };

        match executor.wait(&handle).await {
            Ok(receipt) => {
                info!(
                    transaction_id = %receipt.transaction_id,
                    state = %receipt.state,
                    count = transactions.len(),
                    "Approval batch settled"
                );
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    transaction_id = %handle.transaction_id,
                    "Approval batch did not settle"
                );
                false
            }
        }
    }
}
