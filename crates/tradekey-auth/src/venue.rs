//! Venue credential endpoints.
//!
//! Both endpoints authenticate with a signed `ClobAuth` attestation carried
//! in `POLY_*` headers:
//!
//! - `GET  {host}/auth/derive-api-key` -> existing credentials for the address
//! - `POST {host}/auth/api-key`        -> newly created credentials

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;
use tradekey_core::{ApiCredentials, BoxFuture};

use crate::attestation::SignedAttestation;
use crate::error::{VenueError, VenueResult};

const HEADER_ADDRESS: &str = "POLY_ADDRESS";
const HEADER_SIGNATURE: &str = "POLY_SIGNATURE";
const HEADER_TIMESTAMP: &str = "POLY_TIMESTAMP";
const HEADER_NONCE: &str = "POLY_NONCE";

/// Credential triple as returned by the venue, before validation.
///
/// Any field may be missing or empty; [`RawCredentials::into_credentials`]
/// only yields a value when all three are present.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawCredentials {
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl RawCredentials {
    pub fn into_credentials(self) -> Option<ApiCredentials> {
        ApiCredentials::from_parts(self.api_key, self.secret, self.passphrase)
    }
}

impl std::fmt::Debug for RawCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCredentials")
            .field("has_api_key", &self.api_key.is_some())
            .field("has_secret", &self.secret.is_some())
            .field("has_passphrase", &self.passphrase.is_some())
            .finish()
    }
}

/// Trait for the venue's credential endpoints.
pub trait CredentialVenue: Send + Sync {
    /// Fetch the credentials already registered for the attested address.
    fn derive_api_key<'a>(
        &'a self,
        attestation: &'a SignedAttestation,
    ) -> BoxFuture<'a, VenueResult<RawCredentials>>;

    /// Register new credentials for the attested address.
    fn create_api_key<'a>(
        &'a self,
        attestation: &'a SignedAttestation,
    ) -> BoxFuture<'a, VenueResult<RawCredentials>>;
}

/// Arc wrapper for CredentialVenue trait objects.
pub type DynCredentialVenue = Arc<dyn CredentialVenue>;

/// HTTP client for the venue's auth endpoints.
pub struct HttpVenueClient {
    client: Client,
    host: String,
}

impl HttpVenueClient {
    pub fn new(host: impl Into<String>, timeout: Duration) -> VenueResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VenueError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            host: host.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host.trim_end_matches('/'), path)
    }

    fn with_attestation(
        request: RequestBuilder,
        attestation: &SignedAttestation,
    ) -> RequestBuilder {
        request
            .header(HEADER_ADDRESS, attestation.address.to_string())
            .header(HEADER_SIGNATURE, &attestation.signature)
            .header(HEADER_TIMESTAMP, &attestation.timestamp)
            .header(HEADER_NONCE, attestation.nonce.to_string())
    }

    async fn send(&self, request: RequestBuilder) -> VenueResult<RawCredentials> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| VenueError::Decode(e.to_string()))
    }
}

impl CredentialVenue for HttpVenueClient {
    fn derive_api_key<'a>(
        &'a self,
        attestation: &'a SignedAttestation,
    ) -> BoxFuture<'a, VenueResult<RawCredentials>> {
        Box::pin(async move {
            debug!(address = %attestation.address, "Deriving API key");
            let request = self.client.get(self.url("auth/derive-api-key"));
            self.send(Self::with_attestation(request, attestation)).await
        })
    }

    fn create_api_key<'a>(
        &'a self,
        attestation: &'a SignedAttestation,
    ) -> BoxFuture<'a, VenueResult<RawCredentials>> {
        Box::pin(async move {
            debug!(address = %attestation.address, "Creating API key");
            let request = self.client.post(self.url("auth/api-key"));
            self.send(Self::with_attestation(request, attestation)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_credentials_parse() {
        let raw: RawCredentials = serde_json::from_str(
            r#"{"apiKey":"key-123","secret":"c2VjcmV0","passphrase":"pass"}"#,
        )
        .unwrap();
        let creds = raw.into_credentials().unwrap();
        assert_eq!(creds.key(), "key-123");
        assert_eq!(creds.secret(), "c2VjcmV0");
        assert_eq!(creds.passphrase(), "pass");
    }

    #[test]
    fn test_raw_credentials_missing_field_is_invalid() {
        let raw: RawCredentials =
            serde_json::from_str(r#"{"apiKey":"key-123","passphrase":"pass"}"#).unwrap();
        assert!(raw.into_credentials().is_none());

        let raw: RawCredentials =
            serde_json::from_str(r#"{"apiKey":"","secret":"s","passphrase":"p"}"#).unwrap();
        assert!(raw.into_credentials().is_none());
    }

    #[test]
    fn test_raw_credentials_debug_hides_values() {
        let raw = RawCredentials {
            api_key: Some("key-123".to_string()),
            secret: Some("top-secret".to_string()),
            passphrase: Some("pass".to_string()),
        };
        let dbg = format!("{raw:?}");
        assert!(!dbg.contains("top-secret"));
        assert!(!dbg.contains("key-123"));
    }

    #[test]
    fn test_url_join() {
        let client =
            HttpVenueClient::new("https://clob.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("auth/derive-api-key"),
            "https://clob.example.com/auth/derive-api-key"
        );
    }
}
