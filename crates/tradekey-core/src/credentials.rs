//! Venue API credentials.
//!
//! Security notes:
//! - `Debug` never prints the secret or passphrase; the key is masked.
//! - Field memory is wiped on drop.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of leading key characters kept when masking.
const MASK_VISIBLE_CHARS: usize = 6;

/// API credentials issued by the trading venue for one signing identity.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiCredentials {
    key: String,
    secret: String,
    passphrase: String,
}

impl ApiCredentials {
    pub fn new(
        key: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Build credentials from possibly-missing venue fields.
    ///
    /// Returns `None` unless all three are present and non-blank.
    pub fn from_parts(
        key: Option<String>,
        secret: Option<String>,
        passphrase: Option<String>,
    ) -> Option<Self> {
        let creds = Self::new(key?, secret?, passphrase?);
        creds.is_valid().then_some(creds)
    }

    /// Structural validity: key, secret and passphrase all non-blank.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.key.trim().is_empty()
            && !self.secret.trim().is_empty()
            && !self.passphrase.trim().is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Key prefix safe for logs, e.g. `"3f2a9c…"`.
    #[must_use]
    pub fn masked_key(&self) -> String {
        let visible: String = self.key.chars().take(MASK_VISIBLE_CHARS).collect();
        format!("{visible}…")
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &self.masked_key())
            .field("secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
