//! Mock venue and signer for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, PrimitiveSignature, B256};
use parking_lot::Mutex;
use tradekey_core::{ApiCredentials, BoxFuture};

use crate::attestation::SignedAttestation;
use crate::error::{SignerError, VenueError, VenueResult};
use crate::signer::{AttestationSigner, LocalSigner};
use crate::venue::{CredentialVenue, RawCredentials};

/// Scripted reply for one venue endpoint.
#[derive(Debug, Clone)]
pub enum VenueReply {
    Valid(ApiCredentials),
    /// Well-formed response with missing or empty fields.
    Invalid(RawCredentials),
    Error(String),
}

impl VenueReply {
    fn to_result(&self) -> VenueResult<RawCredentials> {
        match self {
            Self::Valid(creds) => Ok(RawCredentials {
                api_key: Some(creds.key().to_string()),
                secret: Some(creds.secret().to_string()),
                passphrase: Some(creds.passphrase().to_string()),
            }),
            Self::Invalid(raw) => Ok(raw.clone()),
            Self::Error(message) => Err(VenueError::Status {
                status: 400,
                body: message.clone(),
            }),
        }
    }
}

/// Mock credential venue with per-endpoint scripted replies.
#[derive(Debug)]
pub struct MockVenue {
    derive_reply: Mutex<VenueReply>,
    create_reply: Mutex<VenueReply>,
    derive_calls: AtomicUsize,
    create_calls: AtomicUsize,
    last_attestation: Mutex<Option<SignedAttestation>>,
}

impl MockVenue {
    pub fn new(derive_reply: VenueReply, create_reply: VenueReply) -> Self {
        Self {
            derive_reply: Mutex::new(derive_reply),
            create_reply: Mutex::new(create_reply),
            derive_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            last_attestation: Mutex::new(None),
        }
    }

    /// Venue that already knows `creds` for every address.
    pub fn with_existing(creds: ApiCredentials) -> Self {
        Self::new(
            VenueReply::Valid(creds),
            VenueReply::Error("key already exists".to_string()),
        )
    }

    pub fn set_derive_reply(&self, reply: VenueReply) {
        *self.derive_reply.lock() = reply;
    }

    pub fn set_create_reply(&self, reply: VenueReply) {
        *self.create_reply.lock() = reply;
    }

    pub fn derive_calls(&self) -> usize {
        self.derive_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn last_attestation(&self) -> Option<SignedAttestation> {
        self.last_attestation.lock().clone()
    }
}

impl CredentialVenue for MockVenue {
    fn derive_api_key<'a>(
        &'a self,
        attestation: &'a SignedAttestation,
    ) -> BoxFuture<'a, VenueResult<RawCredentials>> {
        Box::pin(async move {
            self.derive_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_attestation.lock() = Some(attestation.clone());
            self.derive_reply.lock().to_result()
        })
    }

    fn create_api_key<'a>(
        &'a self,
        attestation: &'a SignedAttestation,
    ) -> BoxFuture<'a, VenueResult<RawCredentials>> {
        Box::pin(async move {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_attestation.lock() = Some(attestation.clone());
            self.create_reply.lock().to_result()
        })
    }
}

/// Signer that reports an address but refuses to sign.
#[derive(Debug, Clone)]
pub struct FailingSigner {
    address: Address,
}

impl FailingSigner {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl AttestationSigner for FailingSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_hash(&self, _hash: B256) -> BoxFuture<'_, Result<PrimitiveSignature, SignerError>> {
        Box::pin(async { Err(SignerError::Unavailable) })
    }
}

/// Local signer that counts signing requests.
#[derive(Debug)]
pub struct CountingSigner {
    inner: LocalSigner,
    signatures: AtomicUsize,
}

impl CountingSigner {
    pub fn new(inner: LocalSigner) -> Self {
        Self {
            inner,
            signatures: AtomicUsize::new(0),
        }
    }

    pub fn signatures(&self) -> usize {
        self.signatures.load(Ordering::SeqCst)
    }
}

impl AttestationSigner for CountingSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn sign_hash(&self, hash: B256) -> BoxFuture<'_, Result<PrimitiveSignature, SignerError>> {
        self.signatures.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_hash(hash)
    }
}
