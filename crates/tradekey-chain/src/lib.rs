//! On-chain side of session provisioning.
//!
//! # Key Components
//!
//! - [`AddressDeriver`]: EOA -> smart-wallet address (CREATE2, no I/O)
//! - [`DeploymentManager`]: deployment check and deploy-then-verify
//! - [`ApprovalManager`]: approval reads and corrective transaction batches
//! - [`ChainReader`] / [`RpcChainReader`]: read-only contract calls
//! - [`RelayExecutor`] / [`HttpRelayClient`]: relayed transaction submission
//! - [`MockChainReader`] / [`MockRelayExecutor`]: in-memory collaborators for tests

pub mod approvals;
pub mod contracts;
pub mod deployment;
pub mod derive;
pub mod error;
pub mod mock;
pub mod reader;
pub mod relay;

pub use approvals::{ApprovalManager, ApprovalTransaction, DEFAULT_ALLOWANCE_THRESHOLD};
pub use deployment::{DeploymentConfig, DeploymentManager};
pub use derive::AddressDeriver;
pub use error::{
    ApprovalError, ChainError, ChainResult, DeploymentError, DerivationError, RelayError,
    RelayResult,
};
pub use mock::{MockChainReader, MockRelayExecutor};
pub use reader::{ChainReader, DynChainReader, RpcChainReader};
pub use relay::{
    DynRelayExecutor, HttpRelayClient, RelayCall, RelayConfig, RelayExecutor, RelayHandle,
    RelayReceipt, RelayState,
};
