//! Core domain types for tradekey.
//!
//! This crate provides the types shared by every stage of session provisioning:
//! - `ChainConfig`: contract addresses and the approval table for one chain
//! - `ApiCredentials`: venue-issued credentials (redacted, zeroized on drop)
//! - `ApprovalStatus`: result of one on-chain approval read
//! - `TradingSession`, `SessionStep`: the session aggregate and state cursor

use std::future::Future;
use std::pin::Pin;

pub mod approval;
pub mod chain;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod session;

pub use approval::{ApprovalCheck, ApprovalStatus};
pub use chain::{parse_address, parse_b256, ApprovalKind, ApprovalRequirement, ChainConfig};
pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::ApiCredentials;
pub use error::{CoreError, Result};
pub use session::{SessionStep, TradingSession};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
