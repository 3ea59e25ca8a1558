//! Venue API credentials for tradekey.
//!
//! # Key Components
//!
//! - [`Attestor`]: builds and signs the EIP-712 `ClobAuth` attestation
//! - [`AttestationSigner`] / [`LocalSigner`]: signing identity (private key)
//! - [`KeySource`]: where the private key is loaded from
//! - [`CredentialVenue`] / [`HttpVenueClient`]: remote derive/create endpoints
//! - [`CredentialBroker`]: derive-or-create with structural validation
//!
//! # Derive-or-create
//!
//! 1. derive (errors and malformed results mean "no existing credentials")
//! 2. create
//! 3. both failed -> `AuthError::Exhausted`

pub mod attestation;
pub mod broker;
pub mod error;
pub mod keys;
pub mod mock;
pub mod signer;
pub mod venue;

pub use attestation::{Attestor, SignedAttestation, CLOB_AUTH_MESSAGE};
pub use broker::CredentialBroker;
pub use error::{AuthError, KeyError, SignerError, VenueError, VenueResult};
pub use keys::{load_signer, KeySource};
pub use mock::{CountingSigner, FailingSigner, MockVenue, VenueReply};
pub use signer::{AttestationSigner, DynAttestationSigner, LocalSigner};
pub use venue::{CredentialVenue, DynCredentialVenue, HttpVenueClient, RawCredentials};
