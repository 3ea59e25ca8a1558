//! Smart-wallet (Safe proxy) address derivation.
//!
//! The proxy address is the CREATE2 address of the Safe factory:
//! `salt = keccak256(abi.encode(eoa))`,
//! `address = keccak256(0xff ++ factory ++ salt ++ init_code_hash)[12..]`.

use alloy::primitives::{keccak256, Address, B256};
use tradekey_core::ChainConfig;

use crate::error::DerivationError;

/// Derives the smart-wallet address owned by an EOA. Pure, no I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    factory: Address,
    init_code_hash: B256,
}

impl AddressDeriver {
    pub fn new(chain: &ChainConfig) -> Self {
        Self {
            factory: chain.safe_factory,
            init_code_hash: chain.safe_init_code_hash,
        }
    }

    /// Derive the proxy address for `eoa`.
    #[must_use]
    pub fn derive(&self, eoa: Address) -> Address {
        let salt = keccak256(eoa.into_word());
        self.factory.create2(salt.0, self.init_code_hash.0)
    }

    /// Derive, rejecting the zero address (no wallet connected).
    pub fn derive_checked(&self, eoa: Address) -> Result<Address, DerivationError> {
        if eoa.is_zero() {
            return Err(DerivationError::ZeroAddress);
        }
        Ok(self.derive(eoa))
    }
}
