//! Auth error types.

use alloy::primitives::Address;
use thiserror::Error;

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Signing errors.
#[derive(Debug, Clone, Error)]
pub enum SignerError {
    #[error("No signer connected")]
    Unavailable,

    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

impl From<alloy::signers::Error> for SignerError {
    fn from(e: alloy::signers::Error) -> Self {
        SignerError::SigningFailed(e.to_string())
    }
}

/// Credential venue errors.
#[derive(Debug, Clone, Error)]
pub enum VenueError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Venue returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode venue response: {0}")]
    Decode(String),
}

pub type VenueResult<T> = Result<T, VenueError>;

/// Credential acquisition errors.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Wallet could not sign the authentication message: {0}")]
    Signer(#[from] SignerError),

    #[error("Connected signer {actual} does not match wallet {expected}")]
    SignerMismatch { expected: Address, actual: Address },

    #[error(
        "Could not obtain trading credentials. The venue may not recognize this wallet yet \
         (no account, or the wallet deployment is still settling). Try again shortly. \
         ({reason})"
    )]
    Exhausted { reason: String },
}

impl From<reqwest::Error> for VenueError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            VenueError::Decode(e.to_string())
        } else {
            VenueError::HttpClient(e.to_string())
        }
    }
}
