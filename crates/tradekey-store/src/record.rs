//! Persisted session record.

use std::str::FromStr;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tradekey_core::{ApiCredentials, TradingSession};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{StoreError, StoreResult};

/// Record layout version. Records with any other version are discarded.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredCredentials {
    key: String,
    secret: String,
    passphrase: String,
}

/// On-disk form of a [`TradingSession`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    version: u32,
    eoa_address: String,
    safe_address: String,
    is_safe_deployed: bool,
    has_approvals: bool,
    has_api_credentials: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_credentials: Option<StoredCredentials>,
    last_checked: DateTime<Utc>,
}

impl StoredSession {
    pub fn from_session(session: &TradingSession) -> Self {
        Self {
            version: SCHEMA_VERSION,
            eoa_address: session.eoa_address.to_string(),
            safe_address: session.safe_address.to_string(),
            is_safe_deployed: session.is_safe_deployed,
            has_approvals: session.has_approvals,
            has_api_credentials: session.has_api_credentials(),
            api_credentials: session.api_credentials().map(|c| StoredCredentials {
                key: c.key().to_string(),
                secret: c.secret().to_string(),
                passphrase: c.passphrase().to_string(),
            }),
            last_checked: session.last_checked,
        }
    }

    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate and convert back into a session owned by `expected_eoa`.
    ///
    /// # Errors
    /// `StoreError::Corrupt` on version mismatch, unparsable or foreign
    /// addresses, or a credential flag that disagrees with the stored triple.
    pub fn into_session(self, expected_eoa: Address) -> StoreResult<TradingSession> {
        if self.version != SCHEMA_VERSION {
            return Err(StoreError::Corrupt(format!(
                "schema version {} (expected {SCHEMA_VERSION})",
                self.version
            )));
        }

        let eoa = parse_address("eoaAddress", &self.eoa_address)?;
        if eoa != expected_eoa {
            return Err(StoreError::Corrupt(format!(
                "record belongs to {eoa}, not {expected_eoa}"
            )));
        }
        let safe = parse_address("safeAddress", &self.safe_address)?;

        let credentials = self.api_credentials.as_ref().map(|c| {
            ApiCredentials::new(c.key.clone(), c.secret.clone(), c.passphrase.clone())
        });
        let credentials_valid = credentials.as_ref().is_some_and(ApiCredentials::is_valid);
        if self.has_api_credentials != credentials_valid {
            return Err(StoreError::Corrupt(
                "credential flag disagrees with stored credentials".to_string(),
            ));
        }

        let mut session = TradingSession::new(eoa, safe, self.last_checked);
        session.is_safe_deployed = self.is_safe_deployed;
        session.has_approvals = self.has_approvals;
        if let Some(credentials) = credentials {
            session.set_credentials(credentials);
        }
        Ok(session)
    }
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("version", &self.version)
            .field("eoa_address", &self.eoa_address)
            .field("safe_address", &self.safe_address)
            .field("is_safe_deployed", &self.is_safe_deployed)
            .field("has_approvals", &self.has_approvals)
            .field("has_api_credentials", &self.has_api_credentials)
            .field("last_checked", &self.last_checked)
            .finish_non_exhaustive()
    }
}

fn parse_address(field: &str, value: &str) -> StoreResult<Address> {
    Address::from_str(value).map_err(|e| StoreError::Corrupt(format!("{field}: {e}")))
}
