//! Read-only chain access.
//!
//! `ChainReader` abstracts the three reads provisioning needs so approval and
//! deployment logic can be tested without a node. `RpcChainReader` is the
//! JSON-RPC implementation (`eth_call`, `eth_getCode`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use tradekey_core::BoxFuture;

use crate::contracts::{IERC1155, IERC20};
use crate::error::{ChainError, ChainResult};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for read-only contract calls.
pub trait ChainReader: Send + Sync {
    /// ERC-20 `allowance(owner, spender)` on `token`.
    fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> BoxFuture<'_, ChainResult<U256>>;

    /// ERC-1155 `isApprovedForAll(owner, operator)` on `token`.
    fn is_approved_for_all(
        &self,
        token: Address,
        owner: Address,
        operator: Address,
    ) -> BoxFuture<'_, ChainResult<bool>>;

    /// Whether `address` has contract code deployed.
    fn has_code(&self, address: Address) -> BoxFuture<'_, ChainResult<bool>>;
}

/// Arc wrapper for ChainReader trait objects.
pub type DynChainReader = Arc<dyn ChainReader>;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC chain reader.
pub struct RpcChainReader {
    client: Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl RpcChainReader {
    /// Create a new reader for `rpc_url`.
    pub fn new(rpc_url: impl Into<String>) -> ChainResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ChainError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> ChainResult<Vec<u8>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Decode(format!("Failed to parse RPC response: {e}")))?;

        if let Some(err) = body.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = body
            .result
            .ok_or_else(|| ChainError::Decode(format!("{method}: missing result")))?;
        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| ChainError::Decode(format!("{method}: {e}")))
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> ChainResult<Vec<u8>> {
        let params = json!([
            { "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        self.request("eth_call", params).await
    }
}

impl ChainReader for RpcChainReader {
    fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            let call = IERC20::allowanceCall { owner, spender };
            let output = self.eth_call(token, call.abi_encode()).await?;
            let decoded = IERC20::allowanceCall::abi_decode_returns(&output, true)
                .map_err(|e| ChainError::Decode(format!("allowance: {e}")))?;
            debug!(%token, %owner, %spender, allowance = %decoded._0, "Read ERC-20 allowance");
            Ok(decoded._0)
        })
    }

    fn is_approved_for_all(
        &self,
        token: Address,
        owner: Address,
        operator: Address,
    ) -> BoxFuture<'_, ChainResult<bool>> {
        Box::pin(async move {
            let call = IERC1155::isApprovedForAllCall {
                account: owner,
                operator,
            };
            let output = self.eth_call(token, call.abi_encode()).await?;
            let decoded = IERC1155::isApprovedForAllCall::abi_decode_returns(&output, true)
                .map_err(|e| ChainError::Decode(format!("isApprovedForAll: {e}")))?;
            debug!(%token, %owner, %operator, approved = decoded._0, "Read ERC-1155 approval");
            Ok(decoded._0)
        })
    }

    fn has_code(&self, address: Address) -> BoxFuture<'_, ChainResult<bool>> {
        Box::pin(async move {
            let code = self
                .request("eth_getCode", json!([address.to_string(), "latest"]))
                .await?;
            Ok(!code.is_empty())
        })
    }
}
