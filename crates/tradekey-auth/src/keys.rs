//! Private key loading.

use std::path::PathBuf;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::signer::LocalSigner;

/// Source of the private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Load from environment variable (development).
    EnvVar { var_name: String },
    /// Load from file (production, recommend 0600 permissions).
    File { path: PathBuf },
}

/// Parse hex key from string (supports 0x prefix and whitespace trimming).
fn parse_hex_key(hex_str: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let trimmed = hex_str.trim().trim_start_matches("0x");
    Ok(Zeroizing::new(hex::decode(trimmed)?))
}

/// Load a signer and optionally verify its address.
///
/// # Errors
/// Returns `KeyError` if:
/// - Environment variable not found
/// - File read fails
/// - Hex decoding fails
/// - Private key is invalid
/// - Address mismatch
pub fn load_signer(
    source: &KeySource,
    expected_address: Option<Address>,
) -> Result<LocalSigner, KeyError> {
    let secret_bytes = match source {
        KeySource::EnvVar { var_name } => {
            let hex = Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            );
            parse_hex_key(&hex)?
        }
        KeySource::File { path } => {
            let content = Zeroizing::new(std::fs::read_to_string(path)?);
            parse_hex_key(&content)?
        }
    };

    let signer = PrivateKeySigner::from_slice(&secret_bytes)
        .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

    if let Some(expected) = expected_address {
        if signer.address() != expected {
            return Err(KeyError::AddressMismatch {
                expected,
                actual: signer.address(),
            });
        }
    }

    Ok(LocalSigner::new(signer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::AttestationSigner;
    use std::io::Write;

    // Well-known test private key (DO NOT use in production)
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn key_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_load_from_file() {
        let file = key_file(TEST_PRIVATE_KEY);
        let source = KeySource::File {
            path: file.path().to_path_buf(),
        };

        let signer = load_signer(&source, None).unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(signer.address(), expected);
    }

    #[test]
    fn test_address_mismatch() {
        let file = key_file(TEST_PRIVATE_KEY);
        let source = KeySource::File {
            path: file.path().to_path_buf(),
        };

        let result = load_signer(&source, Some(Address::ZERO));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_invalid_hex() {
        let file = key_file("0xnothex");
        let source = KeySource::File {
            path: file.path().to_path_buf(),
        };
        assert!(matches!(load_signer(&source, None), Err(KeyError::HexDecode(_))));
    }

    #[test]
    fn test_missing_env_var() {
        let source = KeySource::EnvVar {
            var_name: "TRADEKEY_TEST_KEY_THAT_IS_NOT_SET".to_string(),
        };
        assert!(matches!(
            load_signer(&source, None),
            Err(KeyError::EnvVarNotFound(_))
        ));
    }
}
