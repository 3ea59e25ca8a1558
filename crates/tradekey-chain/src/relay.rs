//! Relayed transaction executor.
//!
//! The relay submits transactions on behalf of the user's smart wallet and
//! pays gas. This module defines the executor trait the provisioning steps
//! depend on and an HTTP client for a JSON relay service:
//!
//! - `GET  {base}/deployed?address=0x..`  -> `{"deployed": bool}`
//! - `POST {base}/submit` (`SAFE-CREATE` or `SAFE`)
//!   -> `{"transactionID": "...", "proxyAddress": "0x.."}`
//! - `GET  {base}/transaction?id=..`      -> `{"state": "STATE_...", "transactionHash": "0x.."}`

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tradekey_core::BoxFuture;

use crate::error::{RelayError, RelayResult};

/// One call inside a relayed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Handle for a submitted relay transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHandle {
    pub transaction_id: String,
    /// Proxy address reported by the relay (deployments only).
    pub proxy_address: Option<Address>,
}

/// Relay-side transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Pending,
    Mined,
    Confirmed,
    Failed,
}

impl RelayState {
    fn parse(raw: &str) -> Self {
        match raw {
            "STATE_MINED" => Self::Mined,
            "STATE_CONFIRMED" => Self::Confirmed,
            "STATE_FAILED" | "STATE_INVALID" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Mined or confirmed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Mined | Self::Confirmed)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Mined => write!(f, "mined"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Final state of a relayed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    pub transaction_id: String,
    pub transaction_hash: Option<B256>,
    pub state: RelayState,
}

/// Trait for relayed transaction submission.
///
/// Implementations are bound to one owner EOA; `deploy` creates that owner's
/// smart wallet and `execute` runs a batch from it.
pub trait RelayExecutor: Send + Sync {
    /// Ask the relay whether `safe` is deployed.
    fn get_deployed(&self, safe: Address) -> BoxFuture<'_, RelayResult<bool>>;

    /// Request deployment of the owner's smart wallet.
    fn deploy(&self) -> BoxFuture<'_, RelayResult<RelayHandle>>;

    /// Submit a batch of calls as one relayed transaction.
    fn execute(
        &self,
        calls: Vec<RelayCall>,
        description: String,
    ) -> BoxFuture<'_, RelayResult<RelayHandle>>;

    /// Wait until the transaction is mined/confirmed, or fails.
    fn wait<'a>(&'a self, handle: &'a RelayHandle) -> BoxFuture<'a, RelayResult<RelayReceipt>>;
}

/// Arc wrapper for RelayExecutor trait objects.
pub type DynRelayExecutor = Arc<dyn RelayExecutor>;

/// HTTP relay client configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: String,
    /// Delay between transaction status polls.
    pub poll_interval: Duration,
    /// Polls before `wait` gives up.
    pub max_polls: u32,
    pub request_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://relayer-v2.polymarket.com".to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 100,
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Serialize)]
struct CallWire {
    to: String,
    data: String,
    value: String,
}

impl From<&RelayCall> for CallWire {
    fn from(call: &RelayCall) -> Self {
        Self {
            to: call.to.to_string(),
            data: format!("0x{}", hex::encode(&call.data)),
            value: call.value.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest {
    #[serde(rename = "type")]
    request_type: &'static str,
    from: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    calls: Vec<CallWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(rename = "transactionID")]
    transaction_id: String,
    #[serde(default)]
    proxy_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeployedResponse {
    deployed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
    state: String,
    #[serde(default)]
    transaction_hash: Option<String>,
}

/// HTTP client for the relay service, bound to one owner EOA.
pub struct HttpRelayClient {
    client: Client,
    config: RelayConfig,
    owner: Address,
}

impl HttpRelayClient {
    pub fn new(config: RelayConfig, owner: Address) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            owner,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn check_status(response: reqwest::Response) -> RelayResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RelayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn submit(&self, request: SubmitRequest) -> RelayResult<RelayHandle> {
        let response = self
            .client
            .post(self.url("submit"))
            .json(&request)
            .send()
            .await?;
        let body: SubmitResponse = Self::check_status(response).await?.json().await?;

        let proxy_address = body
            .proxy_address
            .as_deref()
            .map(Address::from_str)
            .transpose()
            .map_err(|e| RelayError::Decode(format!("proxyAddress: {e}")))?;

        info!(
            transaction_id = %body.transaction_id,
            kind = request.request_type,
            "Relay accepted transaction"
        );

        Ok(RelayHandle {
            transaction_id: body.transaction_id,
            proxy_address,
        })
    }

    async fn poll_once(&self, transaction_id: &str) -> RelayResult<TransactionResponse> {
        let url = format!("{}?id={}", self.url("transaction"), transaction_id);
        let response = self.client.get(url).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }
}

impl RelayExecutor for HttpRelayClient {
    fn get_deployed(&self, safe: Address) -> BoxFuture<'_, RelayResult<bool>> {
        Box::pin(async move {
            let url = format!("{}?address={}", self.url("deployed"), safe);
            let response = self.client.get(url).send().await?;
            let body: DeployedResponse = Self::check_status(response).await?.json().await?;
            debug!(%safe, deployed = body.deployed, "Relay deployment status");
            Ok(body.deployed)
        })
    }

    fn deploy(&self) -> BoxFuture<'_, RelayResult<RelayHandle>> {
        Box::pin(async move {
            self.submit(SubmitRequest {
                request_type: "SAFE-CREATE",
                from: self.owner.to_string(),
                calls: Vec::new(),
                metadata: None,
            })
            .await
        })
    }

    fn execute(
        &self,
        calls: Vec<RelayCall>,
        description: String,
    ) -> BoxFuture<'_, RelayResult<RelayHandle>> {
        Box::pin(async move {
            self.submit(SubmitRequest {
                request_type: "SAFE",
                from: self.owner.to_string(),
                calls: calls.iter().map(CallWire::from).collect(),
                metadata: Some(description),
            })
            .await
        })
    }

    fn wait<'a>(&'a self, handle: &'a RelayHandle) -> BoxFuture<'a, RelayResult<RelayReceipt>> {
        Box::pin(async move {
            for attempt in 0..self.config.max_polls {
                let tx = self.poll_once(&handle.transaction_id).await?;
                let state = RelayState::parse(&tx.state);

                match state {
                    RelayState::Failed => {
                        warn!(
                            transaction_id = %handle.transaction_id,
                            state = %tx.state,
                            "Relayed transaction failed"
                        );
                        return Err(RelayError::TransactionFailed {
                            transaction_id: handle.transaction_id.clone(),
                            state: tx.state,
                        });
                    }
                    s if s.is_settled() => {
                        let transaction_hash = tx
                            .transaction_hash
                            .as_deref()
                            .map(B256::from_str)
                            .transpose()
                            .map_err(|e| RelayError::Decode(format!("transactionHash: {e}")))?;
                        return Ok(RelayReceipt {
                            transaction_id: handle.transaction_id.clone(),
                            transaction_hash,
                            state,
                        });
                    }
                    _ => {
                        debug!(
                            transaction_id = %handle.transaction_id,
                            attempt,
                            "Relayed transaction pending"
                        );
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
            }

            Err(RelayError::ConfirmationTimeout(handle.transaction_id.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_state_parse() {
        assert_eq!(RelayState::parse("STATE_NEW"), RelayState::Pending);
        assert_eq!(RelayState::parse("STATE_EXECUTED"), RelayState::Pending);
        assert_eq!(RelayState::parse("STATE_MINED"), RelayState::Mined);
        assert_eq!(RelayState::parse("STATE_CONFIRMED"), RelayState::Confirmed);
        assert_eq!(RelayState::parse("STATE_FAILED"), RelayState::Failed);
        assert!(RelayState::Mined.is_settled());
        assert!(!RelayState::Failed.is_settled());
    }

    #[test]
    fn test_submit_request_wire_format() {
        let call = RelayCall {
            to: Address::repeat_byte(0x11),
            data: Bytes::from(vec![0xde, 0xad]),
            value: U256::ZERO,
        };
        let request = SubmitRequest {
            request_type: "SAFE",
            from: Address::repeat_byte(0x22).to_string(),
            calls: vec![CallWire::from(&call)],
            metadata: Some("approve tokens".to_string()),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "SAFE");
        assert_eq!(json["calls"][0]["data"], "0xdead");
        assert_eq!(json["calls"][0]["value"], "0");
        assert_eq!(json["metadata"], "approve tokens");
    }

    #[test]
    fn test_deploy_request_omits_calls() {
        let request = SubmitRequest {
            request_type: "SAFE-CREATE",
            from: Address::repeat_byte(0x22).to_string(),
            calls: Vec::new(),
            metadata: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("calls"));
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_submit_response_parse() {
        let body: SubmitResponse = serde_json::from_str(
            r#"{"transactionID":"abc-123","proxyAddress":"0x1111111111111111111111111111111111111111"}"#,
        )
        .unwrap();
        assert_eq!(body.transaction_id, "abc-123");
        assert!(body.proxy_address.is_some());
    }
}
