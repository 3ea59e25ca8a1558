//! EIP-712 `ClobAuth` attestation.
//!
//! Proves control of an address to the venue:
//! - domain: `{ name: "ClobAuthDomain", version: "1", chainId }`
//! - type: `ClobAuth(address address,string timestamp,uint256 nonce,string message)`
//! - signing hash: `keccak256(0x1901 || domain_separator || struct_hash)`

use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::sol_types::eip712_domain;
use tradekey_core::Clock;

use crate::error::SignerError;
use crate::signer::AttestationSigner;

/// EIP-712 domain constants.
pub const CLOB_AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
pub const CLOB_AUTH_DOMAIN_VERSION: &str = "1";

/// Fixed attestation message.
pub const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

const CLOB_AUTH_TYPE: &[u8] =
    b"ClobAuth(address address,string timestamp,uint256 nonce,string message)";

/// Signed proof of address control, sent with derive/create requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttestation {
    pub address: Address,
    /// Unix seconds, as a decimal string.
    pub timestamp: String,
    pub nonce: u64,
    /// 65-byte signature, 0x-prefixed hex.
    pub signature: String,
}

/// Builds and signs `ClobAuth` attestations.
#[derive(Clone)]
pub struct Attestor {
    chain_id: u64,
    clock: Arc<dyn Clock>,
}

impl Attestor {
    pub fn new(chain_id: u64, clock: Arc<dyn Clock>) -> Self {
        Self { chain_id, clock }
    }

    /// EIP-712 domain separator.
    pub fn domain_separator(&self) -> B256 {
        let domain = eip712_domain! {
            name: CLOB_AUTH_DOMAIN_NAME,
            version: CLOB_AUTH_DOMAIN_VERSION,
            chain_id: self.chain_id,
        };
        domain.hash_struct()
    }

    /// `hashStruct(ClobAuth)`.
    pub fn struct_hash(address: Address, timestamp: &str, nonce: u64) -> B256 {
        let mut data = Vec::with_capacity(32 * 5);
        data.extend_from_slice(keccak256(CLOB_AUTH_TYPE).as_slice());
        data.extend_from_slice(address.into_word().as_slice());
        data.extend_from_slice(keccak256(timestamp.as_bytes()).as_slice());
        data.extend_from_slice(&U256::from(nonce).to_be_bytes::<32>());
        data.extend_from_slice(keccak256(CLOB_AUTH_MESSAGE.as_bytes()).as_slice());
        keccak256(&data)
    }

    /// Final EIP-712 digest to sign.
    pub fn signing_hash(&self, address: Address, timestamp: &str, nonce: u64) -> B256 {
        let mut data = Vec::with_capacity(66);
        data.extend_from_slice(&[0x19, 0x01]);
        data.extend_from_slice(self.domain_separator().as_slice());
        data.extend_from_slice(Self::struct_hash(address, timestamp, nonce).as_slice());
        keccak256(&data)
    }

    /// Sign a fresh attestation (current timestamp) for `signer`.
    pub async fn sign(
        &self,
        signer: &dyn AttestationSigner,
        nonce: u64,
    ) -> Result<SignedAttestation, SignerError> {
        let address = signer.address();
        let timestamp = self.clock.now_secs().to_string();
        let hash = self.signing_hash(address, &timestamp, nonce);

        // NOTE: Do not log the signature
        let signature = signer.sign_hash(hash).await?;

        Ok(SignedAttestation {
            address,
            timestamp,
            nonce,
            signature: format!("0x{}", hex::encode(signature.as_bytes())),
        })
    }
}

impl std::fmt::Debug for Attestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attestor")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}
