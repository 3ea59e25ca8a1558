//! Application wiring.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tradekey_auth::{
    load_signer, AttestationSigner, Attestor, CredentialBroker, HttpVenueClient, KeySource,
    LocalSigner,
};
use tradekey_chain::{
    AddressDeriver, ApprovalManager, ChainReader, HttpRelayClient, RelayConfig, RpcChainReader,
};
use tradekey_core::{ChainConfig, Clock, SessionStep, SystemClock, TradingSession};
use tradekey_session::{SessionOrchestrator, WalletHandle};
use tradekey_store::{FileBackend, FileSessionStore, SessionStore};

use crate::config::AppConfig;
use crate::error::AppResult;

/// Printable session summary. Never includes secrets.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub eoa_address: String,
    pub safe_address: String,
    /// Step `init` would start from, or `complete`.
    pub step: String,
    pub is_safe_deployed: bool,
    pub has_api_credentials: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub has_approvals: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_approvals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl SessionSummary {
    pub fn from_session(session: &TradingSession, step: SessionStep) -> Self {
        Self {
            eoa_address: session.eoa_address.to_string(),
            safe_address: session.safe_address.to_string(),
            step: step.to_string(),
            is_safe_deployed: session.is_safe_deployed,
            has_api_credentials: session.has_api_credentials(),
            api_key: session.api_credentials().map(|c| c.masked_key()),
            has_approvals: session.has_approvals,
            missing_approvals: Vec::new(),
            last_checked: Some(session.last_checked),
        }
    }
}

/// Main application.
pub struct Application {
    chain: ChainConfig,
    signer: Arc<LocalSigner>,
    wallet: WalletHandle,
    reader: Arc<RpcChainReader>,
    store: Arc<FileSessionStore>,
    orchestrator: Arc<SessionOrchestrator>,
}

impl Application {
    /// Build every production collaborator from `config`.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let chain = config.chain.to_chain_config()?;

        let key_source = KeySource::from(&config.key);
        let signer = Arc::new(load_signer(&key_source, config.expected_signer()?)?);
        let eoa = signer.address();
        info!(%eoa, "Signer loaded");

        let reader = Arc::new(RpcChainReader::new(config.chain.rpc_url.clone())?);
        let executor = Arc::new(HttpRelayClient::new(RelayConfig::from(&config.relay), eoa)?);
        let venue = Arc::new(HttpVenueClient::new(
            config.venue.host.clone(),
            Duration::from_millis(config.venue.request_timeout_ms),
        )?);
        let store = Arc::new(FileSessionStore::new(FileBackend::new(&config.store.dir)?));
        debug!(dir = %config.store.dir.display(), "Session store opened");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let broker = CredentialBroker::new(venue, Attestor::new(chain.chain_id, clock.clone()));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            &chain,
            config.session.clone(),
            broker,
            reader.clone(),
            store.clone(),
            clock,
        ));

        let wallet = WalletHandle {
            signer: signer.clone(),
            executor,
        };

        Ok(Self {
            chain,
            signer,
            wallet,
            reader,
            store,
            orchestrator,
        })
    }

    pub fn eoa(&self) -> Address {
        self.signer.address()
    }

    /// Provision the session, logging each step as it happens.
    pub async fn init(&self) -> AppResult<SessionSummary> {
        let eoa = self.eoa();
        let mut transitions = self.orchestrator.subscribe();
        let logger = tokio::spawn(async move {
            loop {
                match transitions.recv().await {
                    Ok(t) if t.eoa == eoa => info!(from = %t.from, to = %t.to, "Session step"),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Step log lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let result = self.orchestrator.initialize(eoa, self.wallet.clone()).await;
        logger.abort();

        let session = result?;
        Ok(SessionSummary::from_session(&session, SessionStep::Complete))
    }

    /// Read-only report: live deployment and approval state plus the cache.
    pub async fn status(&self) -> AppResult<SessionSummary> {
        let eoa = self.eoa();
        let safe = AddressDeriver::new(&self.chain).derive(eoa);

        let has_code = self.reader.has_code(safe).await?;
        let approvals = ApprovalManager::new(&self.chain)
            .check_all(self.reader.as_ref(), safe)
            .await?;
        let cached = self.store.load(eoa).filter(|s| s.safe_address == safe);
        let has_api_credentials = cached.as_ref().is_some_and(TradingSession::has_api_credentials);
        let has_approvals = approvals.all_approved();

        Ok(SessionSummary {
            eoa_address: eoa.to_string(),
            safe_address: safe.to_string(),
            step: pending_step(has_code, has_api_credentials, has_approvals).to_string(),
            is_safe_deployed: has_code,
            has_api_credentials,
            api_key: cached
                .as_ref()
                .and_then(|s| s.api_credentials().map(|c| c.masked_key())),
            has_approvals,
            missing_approvals: approvals.missing().map(|r| r.label.to_string()).collect(),
            last_checked: cached.as_ref().map(|s| s.last_checked),
        })
    }

    /// Forget the cached session.
    pub fn end(&self) {
        self.orchestrator.end_session(self.eoa());
    }
}

/// First step still outstanding for a session in the given state.
fn pending_step(deployed: bool, has_api_credentials: bool, has_approvals: bool) -> SessionStep {
    if !deployed {
        SessionStep::Deploying
    } else if !has_api_credentials {
        SessionStep::Credentials
    } else if !has_approvals {
        SessionStep::Approvals
    } else {
        SessionStep::Complete
    }
}
