//! Session state machine.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tradekey_auth::{AuthError, CredentialBroker, DynAttestationSigner};
use tradekey_chain::{
    AddressDeriver, ApprovalError, ApprovalManager, DeploymentManager, DynChainReader,
    DynRelayExecutor,
};
use tradekey_core::{BoxFuture, ChainConfig, Clock, SessionStep, TradingSession};
use tradekey_store::DynSessionStore;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::status::{SessionStatus, StepTransition};

/// Transition channel capacity. Slow subscribers observe `Lagged`.
const TRANSITION_CHANNEL_CAPACITY: usize = 64;

type SharedRun = Shared<BoxFuture<'static, SessionResult<TradingSession>>>;

/// The user's connected wallet: signing identity plus its relay executor.
#[derive(Clone)]
pub struct WalletHandle {
    pub signer: DynAttestationSigner,
    pub executor: DynRelayExecutor,
}

impl std::fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletHandle")
            .field("signer", &self.signer.address())
            .finish_non_exhaustive()
    }
}

/// Drives session initialization and holds per-EOA status.
pub struct SessionOrchestrator {
    config: SessionConfig,
    deriver: AddressDeriver,
    deployment: DeploymentManager,
    approvals: ApprovalManager,
    broker: CredentialBroker,
    reader: DynChainReader,
    store: DynSessionStore,
    clock: Arc<dyn Clock>,
    statuses: DashMap<Address, SessionStatus>,
    in_flight: DashMap<Address, SharedRun>,
    /// Bumped by `end_session`; a run started under an older epoch is stale.
    epochs: DashMap<Address, u64>,
    transitions: broadcast::Sender<StepTransition>,
}

impl SessionOrchestrator {
    pub fn new(
        chain: &ChainConfig,
        config: SessionConfig,
        broker: CredentialBroker,
        reader: DynChainReader,
        store: DynSessionStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            deployment: DeploymentManager::new(config.deployment_config()),
            deriver: AddressDeriver::new(chain),
            approvals: ApprovalManager::new(chain),
            config,
            broker,
            reader,
            store,
            clock,
            statuses: DashMap::new(),
            in_flight: DashMap::new(),
            epochs: DashMap::new(),
            transitions,
        }
    }

    /// Replace the approval manager (e.g. a custom allowance threshold).
    #[must_use]
    pub fn with_approval_manager(mut self, approvals: ApprovalManager) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to step transitions for every EOA.
    pub fn subscribe(&self) -> broadcast::Receiver<StepTransition> {
        self.transitions.subscribe()
    }

    /// Current snapshot for `eoa` (Idle with nothing attached if unknown).
    pub fn status(&self, eoa: Address) -> SessionStatus {
        self.statuses
            .get(&eoa)
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// Provision a complete trading session for `eoa`.
    ///
    /// Concurrent calls for the same EOA join the run already in flight and
    /// receive its result; the joining caller's `wallet` is not used. A run
    /// abandoned by its callers is resumed by the next call unless
    /// [`Self::end_session`] ran in between.
    /// Never panics: failures are returned and recorded in [`Self::status`].
    pub async fn initialize(
        self: &Arc<Self>,
        eoa: Address,
        wallet: WalletHandle,
    ) -> SessionResult<TradingSession> {
        let run = match self.in_flight.entry(eoa) {
            Entry::Occupied(entry) => {
                debug!(%eoa, "Joining in-flight session initialization");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let this = Arc::clone(self);
                let epoch = self.epoch(eoa);
                let future: BoxFuture<'static, SessionResult<TradingSession>> =
                    Box::pin(async move { this.run_guarded(eoa, epoch, wallet).await });
                let shared = future.shared();
                entry.insert(shared.clone());
                shared
            }
        };

        let result = run.clone().await;
        self.in_flight
            .remove_if(&eoa, |_, current| Shared::ptr_eq(current, &run));
        result
    }

    /// Forget the session for `eoa`. Always succeeds.
    ///
    /// A run still in flight is superseded: it writes nothing further and
    /// the next [`Self::initialize`] starts from scratch.
    pub fn end_session(&self, eoa: Address) {
        *self.epochs.entry(eoa).or_default() += 1;
        if self.in_flight.remove(&eoa).is_some() {
            debug!(%eoa, "Superseded in-flight session initialization");
        }

        if let Err(e) = self.store.clear(eoa) {
            warn!(%eoa, error = %e, "Failed to clear stored session");
        }

        {
            let mut status = self.statuses.entry(eoa).or_default();
            status.error = None;
            status.session = None;
        }
        self.transition(eoa, SessionStep::Idle);
        info!(%eoa, "Session ended");
    }

    async fn run_guarded(
        self: Arc<Self>,
        eoa: Address,
        epoch: u64,
        wallet: WalletHandle,
    ) -> SessionResult<TradingSession> {
        let run = AssertUnwindSafe(self.run(eoa, epoch, &wallet));
        let result = match run.catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(SessionError::Unexpected(panic_message(payload))),
        };

        if !self.is_current(eoa, epoch) {
            debug!(%eoa, "Superseded run finished");
            return Err(SessionError::Superseded);
        }

        if let Err(e) = &result {
            let failed_step = self.status(eoa).step;
            error!(%eoa, step = %failed_step, error = %e, "Session initialization failed");
            self.statuses.entry(eoa).or_default().error = Some(e.clone());
            self.transition(eoa, SessionStep::Idle);
        }
        result
    }

    async fn run(
        &self,
        eoa: Address,
        epoch: u64,
        wallet: &WalletHandle,
    ) -> SessionResult<TradingSession> {
        self.statuses.entry(eoa).or_default().error = None;
        self.advance(eoa, epoch, SessionStep::Checking)?;

        let signer_address = wallet.signer.address();
        if signer_address != eoa {
            return Err(AuthError::SignerMismatch {
                expected: eoa,
                actual: signer_address,
            }
            .into());
        }

        let safe = self.deriver.derive_checked(eoa)?;
        let mut session = self.load_cached(eoa, safe);
        self.publish(eoa, &session);

        // Deployment
        let deployed = self
            .timed(
                SessionStep::Checking,
                self.config.deploy_timeout(),
                self.deployment.is_deployed(wallet.executor.as_ref(), safe),
            )
            .await?;

        if deployed {
            debug!(%eoa, %safe, "Smart wallet already deployed");
            session.is_safe_deployed = true;
        } else {
            session.is_safe_deployed = false;
            self.advance(eoa, epoch, SessionStep::Deploying)?;
            self.timed(
                SessionStep::Deploying,
                self.config.deploy_timeout(),
                self.deployment.deploy_and_verify(wallet.executor.as_ref(), safe),
            )
            .await?;
            session.is_safe_deployed = true;
            self.persist(eoa, epoch, &session)?;
        }

        // Credentials
        if session.has_api_credentials() {
            debug!(%eoa, "Reusing cached API credentials");
        } else {
            self.advance(eoa, epoch, SessionStep::Credentials)?;
            let credentials = self
                .timed(
                    SessionStep::Credentials,
                    self.config.credentials_timeout(),
                    self.broker.derive_or_create(wallet.signer.as_ref()),
                )
                .await?;
            session.set_credentials(credentials);
            self.persist(eoa, epoch, &session)?;
        }

        // Approvals
        self.advance(eoa, epoch, SessionStep::Approvals)?;
        session.has_approvals = false;
        self.timed(
            SessionStep::Approvals,
            self.config.approvals_timeout(),
            self.ensure_approvals(wallet, safe),
        )
        .await?;
        session.has_approvals = true;

        session.last_checked = self.clock.now();
        self.persist(eoa, epoch, &session)?;
        self.advance(eoa, epoch, SessionStep::Complete)?;
        info!(%eoa, %safe, "Trading session ready");
        Ok(session)
    }

    /// Cached session for `eoa`, or a fresh one.
    ///
    /// A cached session for another smart wallet is discarded, and stale
    /// credentials are dropped when a maximum age is configured.
    fn load_cached(&self, eoa: Address, safe: Address) -> TradingSession {
        let mut session = match self.store.load(eoa) {
            Some(cached) if cached.safe_address == safe => cached,
            Some(cached) => {
                warn!(
                    %eoa,
                    cached = %cached.safe_address,
                    derived = %safe,
                    "Discarding cached session for a different smart wallet"
                );
                TradingSession::new(eoa, safe, self.clock.now())
            }
            None => TradingSession::new(eoa, safe, self.clock.now()),
        };

        if let Some(max_age_ms) = self.config.credential_max_age_ms {
            let age_ms = self.clock.now_ms() - session.last_checked.timestamp_millis();
            let max_age_ms = i64::try_from(max_age_ms).unwrap_or(i64::MAX);
            if session.has_api_credentials() && age_ms > max_age_ms {
                debug!(%eoa, age_ms, max_age_ms, "Cached credentials expired");
                session.clear_credentials();
            }
        }

        session
    }

    async fn ensure_approvals(
        &self,
        wallet: &WalletHandle,
        safe: Address,
    ) -> Result<(), ApprovalError> {
        let status = self.approvals.check_all(self.reader.as_ref(), safe).await?;
        if status.all_approved() {
            return Ok(());
        }

        let transactions = self.approvals.build_corrective_transactions(&status);
        info!(%safe, count = transactions.len(), "Submitting missing approvals");
        if self
            .approvals
            .submit_all(wallet.executor.as_ref(), &transactions)
            .await
        {
            Ok(())
        } else {
            Err(ApprovalError::SubmissionFailed {
                count: transactions.len(),
            })
        }
    }

    async fn timed<T, E, F>(
        &self,
        step: SessionStep,
        limit: Duration,
        future: F,
    ) -> SessionResult<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<SessionError>,
    {
        match tokio::time::timeout(limit, future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(SessionError::Timeout {
                step,
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Save a milestone. Storage failures do not fail the run.
    fn persist(&self, eoa: Address, epoch: u64, session: &TradingSession) -> SessionResult<()> {
        self.ensure_current(eoa, epoch)?;
        if let Err(e) = self.store.save(eoa, session) {
            warn!(%eoa, error = %e, "Failed to persist session");
        }
        self.publish(eoa, session);
        Ok(())
    }

    fn advance(&self, eoa: Address, epoch: u64, to: SessionStep) -> SessionResult<()> {
        self.ensure_current(eoa, epoch)?;
        self.transition(eoa, to);
        Ok(())
    }

    fn epoch(&self, eoa: Address) -> u64 {
        self.epochs.get(&eoa).map(|e| *e).unwrap_or_default()
    }

    fn is_current(&self, eoa: Address, epoch: u64) -> bool {
        self.epoch(eoa) == epoch
    }

    fn ensure_current(&self, eoa: Address, epoch: u64) -> SessionResult<()> {
        if self.is_current(eoa, epoch) {
            Ok(())
        } else {
            Err(SessionError::Superseded)
        }
    }

    fn publish(&self, eoa: Address, session: &TradingSession) {
        self.statuses.entry(eoa).or_default().session = Some(session.clone());
    }

    fn transition(&self, eoa: Address, to: SessionStep) {
        let from = {
            let mut status = self.statuses.entry(eoa).or_default();
            std::mem::replace(&mut status.step, to)
        };

        if from != to {
            debug!(%eoa, %from, %to, "Session step");
            // No subscribers is fine
            let _ = self.transitions.send(StepTransition { eoa, from, to });
        }
    }
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("config", &self.config)
            .field("sessions", &self.statuses.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
