//! Trading session orchestration for tradekey.
//!
//! Drives one EOA from nothing to a trade-ready session:
//!
//! ```text
//! Idle -> Checking -> [Deploying] -> [Credentials] -> Approvals -> Complete
//!            \____________ any failure / timeout ____________/ -> Idle
//! ```
//!
//! Deployment and approvals are re-verified on every run; cached
//! credentials are reused when valid. Concurrent runs for one EOA share a
//! single in-flight future.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod status;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use orchestrator::{SessionOrchestrator, WalletHandle};
pub use status::{SessionStatus, StepTransition};
