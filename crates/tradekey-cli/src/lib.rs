//! tradekey command-line application.
//!
//! Wires the production collaborators (JSON-RPC reader, HTTP relay, HTTP
//! venue, file-backed store, local private key) into a
//! [`tradekey_session::SessionOrchestrator`].

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, SessionSummary};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
