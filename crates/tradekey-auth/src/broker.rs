//! Derive-or-create credential acquisition.

use tracing::{debug, info, warn};
use tradekey_core::ApiCredentials;

use crate::attestation::{Attestor, SignedAttestation};
use crate::error::{AuthError, VenueResult};
use crate::signer::AttestationSigner;
use crate::venue::{DynCredentialVenue, RawCredentials};

/// Attestation nonce used for credential requests.
const DEFAULT_NONCE: u64 = 0;

/// Obtains venue credentials for a signing identity.
///
/// Derive is always tried first so an existing key is reused; create runs
/// only when derive fails or returns an incomplete triple. Each request
/// carries its own freshly signed attestation.
pub struct CredentialBroker {
    venue: DynCredentialVenue,
    attestor: Attestor,
}

impl CredentialBroker {
    pub fn new(venue: DynCredentialVenue, attestor: Attestor) -> Self {
        Self { venue, attestor }
    }

    /// Derive existing credentials, falling back to creating new ones.
    ///
    /// # Errors
    /// - `AuthError::Signer` if the attestation cannot be signed
    /// - `AuthError::Exhausted` if neither derive nor create yields a valid triple
    pub async fn derive_or_create(
        &self,
        signer: &dyn AttestationSigner,
    ) -> Result<ApiCredentials, AuthError> {
        let attestation = self.attestor.sign(signer, DEFAULT_NONCE).await?;

        let derive_failure =
            match Self::validate(self.venue.derive_api_key(&attestation).await) {
                Ok(creds) => {
                    info!(
                        address = %attestation.address,
                        api_key = %creds.masked_key(),
                        "Derived existing API credentials"
                    );
                    return Ok(creds);
                }
                Err(reason) => reason,
            };

        debug!(
            address = %attestation.address,
            reason = %derive_failure,
            "No existing API credentials, creating"
        );

        let attestation = self.attestor.sign(signer, DEFAULT_NONCE).await?;
        self.create(&attestation, derive_failure).await
    }

    async fn create(
        &self,
        attestation: &SignedAttestation,
        derive_failure: String,
    ) -> Result<ApiCredentials, AuthError> {
        match Self::validate(self.venue.create_api_key(attestation).await) {
            Ok(creds) => {
                info!(
                    address = %attestation.address,
                    api_key = %creds.masked_key(),
                    "Created new API credentials"
                );
                Ok(creds)
            }
            Err(create_failure) => {
                warn!(
                    address = %attestation.address,
                    derive = %derive_failure,
                    create = %create_failure,
                    "Credential acquisition exhausted"
                );
                Err(AuthError::Exhausted {
                    reason: format!("derive: {derive_failure}; create: {create_failure}"),
                })
            }
        }
    }

    /// Reduce a venue reply to valid credentials or a failure reason.
    fn validate(reply: VenueResult<RawCredentials>) -> Result<ApiCredentials, String> {
        match reply {
            Ok(raw) => raw
                .into_credentials()
                .ok_or_else(|| "incomplete credentials returned".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

impl std::fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBroker")
            .field("attestor", &self.attestor)
            .finish_non_exhaustive()
    }
}
