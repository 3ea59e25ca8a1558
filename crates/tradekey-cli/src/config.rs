//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tradekey_auth::KeySource;
use tradekey_chain::RelayConfig;
use tradekey_core::{parse_address, parse_b256, ChainConfig};
use tradekey_session::SessionConfig;
use tradekey_telemetry::LoggingConfig;

use crate::error::{AppError, AppResult};

/// Chain configuration (`[chain]`). Addresses are hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSection {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_safe_factory")]
    pub safe_factory: String,
    #[serde(default = "default_safe_init_code_hash")]
    pub safe_init_code_hash: String,
    #[serde(default = "default_usdc")]
    pub usdc: String,
    #[serde(default = "default_ctf")]
    pub ctf: String,
    #[serde(default = "default_ctf_exchange")]
    pub ctf_exchange: String,
    #[serde(default = "default_neg_risk_ctf_exchange")]
    pub neg_risk_ctf_exchange: String,
    #[serde(default = "default_neg_risk_adapter")]
    pub neg_risk_adapter: String,
}

fn default_chain_id() -> u64 {
    ChainConfig::polygon().chain_id
}

fn default_rpc_url() -> String {
    "https://polygon-rpc.com".to_string()
}

fn default_safe_factory() -> String {
    ChainConfig::polygon().safe_factory.to_string()
}

fn default_safe_init_code_hash() -> String {
    ChainConfig::polygon().safe_init_code_hash.to_string()
}

fn default_usdc() -> String {
    ChainConfig::polygon().usdc.to_string()
}

fn default_ctf() -> String {
    ChainConfig::polygon().ctf.to_string()
}

fn default_ctf_exchange() -> String {
    ChainConfig::polygon().ctf_exchange.to_string()
}

fn default_neg_risk_ctf_exchange() -> String {
    ChainConfig::polygon().neg_risk_ctf_exchange.to_string()
}

fn default_neg_risk_adapter() -> String {
    ChainConfig::polygon().neg_risk_adapter.to_string()
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            rpc_url: default_rpc_url(),
            safe_factory: default_safe_factory(),
            safe_init_code_hash: default_safe_init_code_hash(),
            usdc: default_usdc(),
            ctf: default_ctf(),
            ctf_exchange: default_ctf_exchange(),
            neg_risk_ctf_exchange: default_neg_risk_ctf_exchange(),
            neg_risk_adapter: default_neg_risk_adapter(),
        }
    }
}

impl ChainSection {
    /// Parse addresses into a [`ChainConfig`].
    pub fn to_chain_config(&self) -> AppResult<ChainConfig> {
        Ok(ChainConfig {
            chain_id: self.chain_id,
            safe_factory: parse_address("chain.safe_factory", &self.safe_factory)?,
            safe_init_code_hash: parse_b256(
                "chain.safe_init_code_hash",
                &self.safe_init_code_hash,
            )?,
            usdc: parse_address("chain.usdc", &self.usdc)?,
            ctf: parse_address("chain.ctf", &self.ctf)?,
            ctf_exchange: parse_address("chain.ctf_exchange", &self.ctf_exchange)?,
            neg_risk_ctf_exchange: parse_address(
                "chain.neg_risk_ctf_exchange",
                &self.neg_risk_ctf_exchange,
            )?,
            neg_risk_adapter: parse_address("chain.neg_risk_adapter", &self.neg_risk_adapter)?,
        })
    }
}

/// Relay configuration (`[relay]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySection {
    #[serde(default = "default_relay_url")]
    pub url: String,
    /// Delay between transaction status polls (ms). Default: 2,000.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Polls before giving up on a transaction. Default: 100.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// Per-request HTTP timeout (ms). Default: 15,000.
    #[serde(default = "default_relay_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_relay_url() -> String {
    RelayConfig::default().base_url
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_polls() -> u32 {
    100
}

fn default_relay_request_timeout_ms() -> u64 {
    15_000
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            request_timeout_ms: default_relay_request_timeout_ms(),
        }
    }
}

impl From<&RelaySection> for RelayConfig {
    fn from(cfg: &RelaySection) -> Self {
        Self {
            base_url: cfg.url.clone(),
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            max_polls: cfg.max_polls,
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }
}

/// Credential venue configuration (`[venue]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueSection {
    #[serde(default = "default_venue_host")]
    pub host: String,
    /// Per-request HTTP timeout (ms). Default: 10,000.
    #[serde(default = "default_venue_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_venue_host() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_venue_request_timeout_ms() -> u64 {
    10_000
}

impl Default for VenueSection {
    fn default() -> Self {
        Self {
            host: default_venue_host(),
            request_timeout_ms: default_venue_request_timeout_ms(),
        }
    }
}

/// Session store configuration (`[store]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./data/sessions")
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Private key source (`[key]`). The key itself never lives in this file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum KeySection {
    Env {
        #[serde(default = "default_key_env_var")]
        var: String,
    },
    File { path: PathBuf },
}

fn default_key_env_var() -> String {
    "TRADEKEY_PRIVATE_KEY".to_string()
}

impl Default for KeySection {
    fn default() -> Self {
        Self::Env {
            var: default_key_env_var(),
        }
    }
}

impl From<&KeySection> for KeySource {
    fn from(cfg: &KeySection) -> Self {
        match cfg {
            KeySection::Env { var } => KeySource::EnvVar {
                var_name: var.clone(),
            },
            KeySection::File { path } => KeySource::File { path: path.clone() },
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub venue: VenueSection,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub key: KeySection,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Expected address of the loaded key. If set, a mismatching key is
    /// rejected at startup. Format: "0x..." address.
    #[serde(default)]
    pub signer_address: Option<String>,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every address field parses.
    pub fn validate(&self) -> AppResult<()> {
        self.chain.to_chain_config()?;
        self.expected_signer()?;
        if self.relay.max_polls == 0 {
            return Err(AppError::Config("relay.max_polls must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn expected_signer(&self) -> AppResult<Option<Address>> {
        self.signer_address
            .as_deref()
            .map(|s| parse_address("signer_address", s))
            .transpose()
            .map_err(AppError::from)
    }
}
