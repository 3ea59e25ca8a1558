//! Signing identity.
//!
//! Security notes:
//! - Private keys live inside `PrivateKeySigner`; never log key material.
//! - Signatures are not logged either.

use std::sync::Arc;

use alloy::primitives::{Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use tradekey_core::BoxFuture;

use crate::error::SignerError;

/// Trait for producing signatures over EIP-712 signing hashes.
///
/// Implemented by a local key here; wallet-connection collaborators can
/// provide their own (which may prompt the user).
pub trait AttestationSigner: Send + Sync {
    /// Address of the signing key.
    fn address(&self) -> Address;

    /// Sign a 32-byte EIP-712 signing hash.
    fn sign_hash(&self, hash: B256) -> BoxFuture<'_, Result<PrimitiveSignature, SignerError>>;
}

/// Arc wrapper for AttestationSigner trait objects.
pub type DynAttestationSigner = Arc<dyn AttestationSigner>;

/// Signer backed by a local private key.
#[derive(Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// Signer from raw 32-byte key material.
    pub fn from_slice(secret: &[u8]) -> Result<Self, SignerError> {
        PrivateKeySigner::from_slice(secret)
            .map(Self::new)
            .map_err(|e| SignerError::SigningFailed(format!("invalid key: {e}")))
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.inner.address())
            .finish_non_exhaustive()
    }
}

impl AttestationSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn sign_hash(&self, hash: B256) -> BoxFuture<'_, Result<PrimitiveSignature, SignerError>> {
        Box::pin(async move { Ok(self.inner.sign_hash(&hash).await?) })
    }
}
