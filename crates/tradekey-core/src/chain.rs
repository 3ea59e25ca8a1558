//! Chain configuration and the fixed approval table.
//!
//! All contract addresses used by session provisioning live here so that the
//! address derivation and the approval checks share one source of truth.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{address, b256, Address, B256};

use crate::error::{CoreError, Result};

/// Polygon mainnet chain id.
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Safe proxy factory used for smart-wallet deployment.
pub const POLYGON_SAFE_FACTORY: Address = address!("aacfeea03eb1561c4e67d661e40682bd20e3541b");

/// keccak256 of the Safe proxy creation code used by the factory.
pub const POLYGON_SAFE_INIT_CODE_HASH: B256 =
    b256!("2bce2127ff07fb632d16c8347c4ebf501f4841168bed00d9e6ef715ddb6fcecf");

/// Bridged USDC (collateral token).
pub const POLYGON_USDC: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");

/// Conditional tokens framework (ERC-1155 outcome tokens).
pub const POLYGON_CTF: Address = address!("4d97dcd97ec945f40cf65f87097ace5ea0476045");

/// CTF exchange.
pub const POLYGON_CTF_EXCHANGE: Address = address!("4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e");

/// Negative-risk CTF exchange.
pub const POLYGON_NEG_RISK_CTF_EXCHANGE: Address =
    address!("c5d563a36ae78145c45a50134d48a1215220f80a");

/// Negative-risk adapter.
pub const POLYGON_NEG_RISK_ADAPTER: Address = address!("d91e80cf2e7be2e162c6513ced06f1dd0da35296");

/// Kind of on-chain permission a requirement checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalKind {
    /// ERC-20 `allowance(owner, spender)` compared against a threshold.
    Erc20Allowance,
    /// ERC-1155 `isApprovedForAll(owner, operator)`.
    Erc1155ApprovalForAll,
}

/// One (token, spender) pair that must be approved before trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApprovalRequirement {
    pub kind: ApprovalKind,
    pub token: Address,
    pub spender: Address,
    /// Short label used in logs and transaction descriptions.
    pub label: &'static str,
}

impl fmt::Display for ApprovalRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

/// Contract addresses for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub safe_factory: Address,
    pub safe_init_code_hash: B256,
    pub usdc: Address,
    pub ctf: Address,
    pub ctf_exchange: Address,
    pub neg_risk_ctf_exchange: Address,
    pub neg_risk_adapter: Address,
}

impl ChainConfig {
    /// Polygon mainnet deployment.
    #[must_use]
    pub fn polygon() -> Self {
        Self {
            chain_id: POLYGON_CHAIN_ID,
            safe_factory: POLYGON_SAFE_FACTORY,
            safe_init_code_hash: POLYGON_SAFE_INIT_CODE_HASH,
            usdc: POLYGON_USDC,
            ctf: POLYGON_CTF,
            ctf_exchange: POLYGON_CTF_EXCHANGE,
            neg_risk_ctf_exchange: POLYGON_NEG_RISK_CTF_EXCHANGE,
            neg_risk_adapter: POLYGON_NEG_RISK_ADAPTER,
        }
    }

    /// Approvals required to trade, in check order.
    ///
    /// The order is fixed so corrective batches are reproducible.
    #[must_use]
    pub fn approval_requirements(&self) -> Vec<ApprovalRequirement> {
        vec![
            ApprovalRequirement {
                kind: ApprovalKind::Erc20Allowance,
                token: self.usdc,
                spender: self.ctf_exchange,
                label: "USDC -> CTF exchange",
            },
            ApprovalRequirement {
                kind: ApprovalKind::Erc20Allowance,
                token: self.usdc,
                spender: self.neg_risk_ctf_exchange,
                label: "USDC -> neg-risk exchange",
            },
            ApprovalRequirement {
                kind: ApprovalKind::Erc20Allowance,
                token: self.usdc,
                spender: self.neg_risk_adapter,
                label: "USDC -> neg-risk adapter",
            },
            ApprovalRequirement {
                kind: ApprovalKind::Erc1155ApprovalForAll,
                token: self.ctf,
                spender: self.ctf_exchange,
                label: "CTF -> CTF exchange",
            },
            ApprovalRequirement {
                kind: ApprovalKind::Erc1155ApprovalForAll,
                token: self.ctf,
                spender: self.neg_risk_ctf_exchange,
                label: "CTF -> neg-risk exchange",
            },
            ApprovalRequirement {
                kind: ApprovalKind::Erc1155ApprovalForAll,
                token: self.ctf,
                spender: self.neg_risk_adapter,
                label: "CTF -> neg-risk adapter",
            },
        ]
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::polygon()
    }
}

/// Parse a hex address, naming the field on failure.
pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| CoreError::InvalidAddress(format!("{field}: {value} ({e})")))
}

/// Parse a 32-byte hex hash, naming the field on failure.
pub fn parse_b256(field: &str, value: &str) -> Result<B256> {
    B256::from_str(value.trim())
        .map_err(|e| CoreError::InvalidHash(format!("{field}: {value} ({e})")))
}
