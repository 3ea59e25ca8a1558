//! End-to-end session initialization against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use tokio::sync::broadcast;
use tradekey_auth::{
    AttestationSigner, Attestor, CredentialBroker, LocalSigner, MockVenue, VenueReply,
};
use tradekey_chain::{
    AddressDeriver, ApprovalError, ChainReader, ChainResult, DeploymentError, MockChainReader,
    MockRelayExecutor, RelayError,
};
use tradekey_core::{
    ApiCredentials, BoxFuture, ChainConfig, Clock, FixedClock, SessionStep, TradingSession,
};
use tradekey_session::{
    SessionConfig, SessionError, SessionOrchestrator, StepTransition, WalletHandle,
};
use tradekey_store::{KvBackend, MemorySessionStore, SessionStore};

// Well-known test private keys (DO NOT use in production)
const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const OTHER_PRIVATE_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

const NOW_MS: i64 = 1_700_000_000_000;

fn signer(key: &str) -> Arc<LocalSigner> {
    Arc::new(LocalSigner::from_slice(&hex::decode(key).unwrap()).unwrap())
}

fn credentials(tag: &str) -> ApiCredentials {
    ApiCredentials::new(format!("key-{tag}"), format!("secret-{tag}"), "pass")
}

struct Harness {
    chain: ChainConfig,
    eoa: Address,
    safe: Address,
    signer: Arc<LocalSigner>,
    reader: Arc<MockChainReader>,
    executor: Arc<MockRelayExecutor>,
    venue: Arc<MockVenue>,
    store: Arc<MemorySessionStore>,
    clock: Arc<FixedClock>,
}

impl Harness {
    fn new() -> Self {
        let chain = ChainConfig::polygon();
        let signer = signer(TEST_PRIVATE_KEY);
        let eoa = signer.address();
        let safe = AddressDeriver::new(&chain).derive(eoa);

        Self {
            reader: Arc::new(MockChainReader::new()),
            executor: Arc::new(MockRelayExecutor::new(safe)),
            venue: Arc::new(MockVenue::new(
                VenueReply::Error("no key for address".to_string()),
                VenueReply::Valid(credentials("created")),
            )),
            store: Arc::new(MemorySessionStore::in_memory()),
            clock: Arc::new(FixedClock::new(NOW_MS)),
            chain,
            eoa,
            safe,
            signer,
        }
    }

    fn orchestrator(&self, config: SessionConfig) -> Arc<SessionOrchestrator> {
        self.orchestrator_with_reader(config, self.reader.clone())
    }

    fn orchestrator_with_reader(
        &self,
        config: SessionConfig,
        reader: Arc<dyn ChainReader>,
    ) -> Arc<SessionOrchestrator> {
        let attestor = Attestor::new(self.chain.chain_id, self.clock.clone());
        let broker = CredentialBroker::new(self.venue.clone(), attestor);
        Arc::new(SessionOrchestrator::new(
            &self.chain,
            config,
            broker,
            reader,
            self.store.clone(),
            self.clock.clone(),
        ))
    }

    fn wallet(&self) -> WalletHandle {
        WalletHandle {
            signer: self.signer.clone(),
            executor: self.executor.clone(),
        }
    }

    /// Stored session that is deployed, credentialed and approved.
    fn seed_cached_session(&self, safe: Address, last_checked_ms: i64) {
        self.seed_session(safe, last_checked_ms, true);
    }

    fn seed_session(&self, safe: Address, last_checked_ms: i64, has_approvals: bool) {
        let clock = FixedClock::new(last_checked_ms);
        let mut session = TradingSession::new(self.eoa, safe, clock.now());
        session.is_safe_deployed = true;
        session.has_approvals = has_approvals;
        session.set_credentials(credentials("cached"));
        self.store.save(self.eoa, &session).unwrap();
    }
}

fn drain(rx: &mut broadcast::Receiver<StepTransition>) -> Vec<(SessionStep, SessionStep)> {
    let mut seen = Vec::new();
    while let Ok(t) = rx.try_recv() {
        seen.push((t.from, t.to));
    }
    seen
}

#[tokio::test]
async fn fresh_eoa_runs_every_step() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(SessionConfig::default());
    let mut rx = orchestrator.subscribe();

    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert!(session.is_complete());
    assert_eq!(session.eoa_address, h.eoa);
    assert_eq!(session.safe_address, h.safe);
    assert_eq!(session.api_credentials().unwrap().key(), "key-created");
    assert_eq!(session.last_checked.timestamp_millis(), NOW_MS);

    assert_eq!(h.executor.deploy_count(), 1);
    assert_eq!(h.venue.derive_calls(), 1);
    assert_eq!(h.venue.create_calls(), 1);

    let executions = h.executor.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].0.len(), 6);

    assert_eq!(
        drain(&mut rx),
        vec![
            (SessionStep::Idle, SessionStep::Checking),
            (SessionStep::Checking, SessionStep::Deploying),
            (SessionStep::Deploying, SessionStep::Credentials),
            (SessionStep::Credentials, SessionStep::Approvals),
            (SessionStep::Approvals, SessionStep::Complete),
        ]
    );

    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Complete);
    assert!(status.error.is_none());
    assert!(status.is_ready());
    assert_eq!(h.store.load(h.eoa), Some(session));
}

#[tokio::test]
async fn cached_session_skips_to_approvals() {
    let h = Harness::new();
    h.seed_cached_session(h.safe, NOW_MS - 60_000);
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);

    let orchestrator = h.orchestrator(SessionConfig::default());
    let mut rx = orchestrator.subscribe();

    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert!(session.is_complete());
    assert_eq!(session.api_credentials().unwrap().key(), "key-cached");
    assert_eq!(session.last_checked.timestamp_millis(), NOW_MS);
    assert_eq!(h.venue.derive_calls(), 0);
    assert_eq!(h.venue.create_calls(), 0);
    assert_eq!(h.executor.deploy_count(), 0);
    assert!(h.executor.executions().is_empty());

    assert_eq!(
        drain(&mut rx),
        vec![
            (SessionStep::Idle, SessionStep::Checking),
            (SessionStep::Checking, SessionStep::Approvals),
            (SessionStep::Approvals, SessionStep::Complete),
        ]
    );
}

#[tokio::test]
async fn cached_session_without_approvals_only_submits_approvals() {
    let h = Harness::new();
    h.seed_session(h.safe, NOW_MS - 60_000, false);
    h.executor.mark_deployed(h.safe);

    let orchestrator = h.orchestrator(SessionConfig::default());
    let mut rx = orchestrator.subscribe();

    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert!(session.is_complete());
    assert_eq!(session.api_credentials().unwrap().key(), "key-cached");
    assert_eq!(h.executor.deploy_count(), 0);
    assert_eq!(h.venue.derive_calls(), 0);
    assert_eq!(h.venue.create_calls(), 0);

    let executions = h.executor.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].0.len(), 6);

    assert_eq!(
        drain(&mut rx),
        vec![
            (SessionStep::Idle, SessionStep::Checking),
            (SessionStep::Checking, SessionStep::Approvals),
            (SessionStep::Approvals, SessionStep::Complete),
        ]
    );
    assert!(h.store.load(h.eoa).unwrap().has_approvals);
}

#[tokio::test]
async fn deployment_and_approvals_are_reverified_for_cached_session() {
    let h = Harness::new();
    // Cache claims everything is done, chain disagrees
    h.seed_cached_session(h.safe, NOW_MS);

    let orchestrator = h.orchestrator(SessionConfig::default());
    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert!(session.is_complete());
    assert_eq!(h.executor.deploy_count(), 1);
    assert_eq!(h.executor.executions().len(), 1);
    assert_eq!(h.venue.derive_calls(), 0);
}

#[tokio::test]
async fn only_missing_approvals_are_submitted() {
    let h = Harness::new();
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);
    h.reader
        .set_allowance(h.chain.usdc, h.safe, h.chain.neg_risk_adapter, U256::ZERO);

    let orchestrator = h.orchestrator(SessionConfig::default());
    orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    let executions = h.executor.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].0.len(), 1);
    assert_eq!(executions[0].0[0].to, h.chain.usdc);
}

#[tokio::test]
async fn concurrent_initialize_shares_one_run() {
    let h = Harness::new();
    h.executor.set_latency(Duration::from_millis(30));
    let orchestrator = h.orchestrator(SessionConfig::default());

    let (a, b) = tokio::join!(
        orchestrator.initialize(h.eoa, h.wallet()),
        orchestrator.initialize(h.eoa, h.wallet()),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a, b);
    assert_eq!(h.executor.deploy_count(), 1);
    assert_eq!(h.venue.derive_calls(), 1);
    assert_eq!(h.executor.executions().len(), 1);
}

#[tokio::test]
async fn sequential_initialize_runs_again() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(SessionConfig::default());

    orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();
    h.reader.approve_all(&h.chain, h.safe);
    orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    // Second run reads deployment again but deploys nothing new
    assert_eq!(h.executor.deploy_count(), 1);
    assert!(h.executor.get_deployed_count() >= 3);
    assert_eq!(h.venue.derive_calls(), 1);
}

#[tokio::test]
async fn step_timeout_resets_to_idle() {
    let h = Harness::new();
    h.executor.set_latency(Duration::from_millis(200));
    let config = SessionConfig {
        deploy_timeout_ms: 20,
        ..SessionConfig::default()
    };
    let orchestrator = h.orchestrator(config);

    let err = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Timeout {
            step: SessionStep::Checking,
            timeout_ms: 20
        }
    ));

    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Idle);
    assert!(matches!(status.error, Some(SessionError::Timeout { .. })));
}

#[tokio::test]
async fn unconfirmed_deployment_fails_before_credentials() {
    let h = Harness::new();
    h.executor.set_deploy_takes_effect(false);
    let orchestrator = h.orchestrator(SessionConfig::default());

    let err = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Deployment(DeploymentError::NotConfirmed(addr)) if addr == h.safe
    ));
    assert_eq!(h.venue.derive_calls(), 0);
    assert!(h.store.load(h.eoa).is_none());

    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Idle);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn failed_deployment_check_fails_open_by_default() {
    let h = Harness::new();
    h.executor
        .set_get_deployed_error(Some(RelayError::Network("connection refused".to_string())));
    let orchestrator = h.orchestrator(SessionConfig::default());

    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();
    assert!(session.is_safe_deployed);
    assert_eq!(h.executor.deploy_count(), 0);
}

#[tokio::test]
async fn failed_deployment_check_fails_closed_when_configured() {
    let h = Harness::new();
    h.executor
        .set_get_deployed_error(Some(RelayError::Network("connection refused".to_string())));
    let config = SessionConfig {
        assume_deployed_on_check_failure: false,
        ..SessionConfig::default()
    };
    let orchestrator = h.orchestrator(config);

    let err = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Deployment(DeploymentError::Network(_))
    ));
    assert!(err.to_string().contains("Check your network connection"));
    assert_eq!(h.executor.deploy_count(), 0);
}

#[tokio::test]
async fn approval_failure_keeps_earlier_milestones() {
    let h = Harness::new();
    h.executor.set_fail_execute(true);
    let orchestrator = h.orchestrator(SessionConfig::default());

    let err = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Approval(ApprovalError::SubmissionFailed { count: 6 })
    ));

    let stored = h.store.load(h.eoa).unwrap();
    assert!(stored.is_safe_deployed);
    assert!(stored.has_api_credentials());
    assert!(!stored.has_approvals);
    assert!(!stored.is_complete());

    // Retry reuses the persisted credentials
    h.executor.set_fail_execute(false);
    orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();
    assert_eq!(h.venue.derive_calls(), 1);
    assert_eq!(h.venue.create_calls(), 1);
    assert!(orchestrator.status(h.eoa).error.is_none());
}

#[tokio::test]
async fn credential_failure_keeps_deployment_milestone() {
    let h = Harness::new();
    h.venue
        .set_create_reply(VenueReply::Error("service unavailable".to_string()));
    let orchestrator = h.orchestrator(SessionConfig::default());
    let mut rx = orchestrator.subscribe();

    let err = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Auth(tradekey_auth::AuthError::Exhausted { .. })
    ));
    assert_eq!(h.venue.derive_calls(), 1);
    assert_eq!(h.venue.create_calls(), 1);
    assert!(h.executor.executions().is_empty());

    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Idle);
    assert!(matches!(
        status.error,
        Some(SessionError::Auth(tradekey_auth::AuthError::Exhausted { .. }))
    ));

    let stored = h.store.load(h.eoa).unwrap();
    assert!(stored.is_safe_deployed);
    assert!(!stored.has_api_credentials());
    assert!(!stored.has_approvals);

    assert_eq!(
        drain(&mut rx).last(),
        Some(&(SessionStep::Credentials, SessionStep::Idle))
    );
}

#[tokio::test]
async fn mismatched_signer_is_rejected() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(SessionConfig::default());
    let wallet = WalletHandle {
        signer: signer(OTHER_PRIVATE_KEY),
        executor: h.executor.clone(),
    };

    let err = orchestrator.initialize(h.eoa, wallet).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Auth(tradekey_auth::AuthError::SignerMismatch { .. })
    ));
    assert_eq!(h.executor.get_deployed_count(), 0);
}

#[tokio::test]
async fn cached_session_for_other_wallet_is_discarded() {
    let h = Harness::new();
    h.seed_cached_session(Address::repeat_byte(0x77), NOW_MS);
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);

    let orchestrator = h.orchestrator(SessionConfig::default());
    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert_eq!(session.safe_address, h.safe);
    assert_eq!(session.api_credentials().unwrap().key(), "key-created");
    assert_eq!(h.venue.derive_calls(), 1);
}

#[tokio::test]
async fn expired_credentials_are_reacquired() {
    let h = Harness::new();
    h.seed_cached_session(h.safe, NOW_MS - 10_000);
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);
    h.venue.set_derive_reply(VenueReply::Valid(credentials("derived")));

    let config = SessionConfig {
        credential_max_age_ms: Some(5_000),
        ..SessionConfig::default()
    };
    let orchestrator = h.orchestrator(config);
    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert_eq!(session.api_credentials().unwrap().key(), "key-derived");
    assert_eq!(h.venue.derive_calls(), 1);
    assert_eq!(h.venue.create_calls(), 0);
}

#[tokio::test]
async fn oversized_max_age_keeps_cached_credentials() {
    let h = Harness::new();
    h.seed_cached_session(h.safe, NOW_MS - 10_000);
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);

    let config = SessionConfig {
        credential_max_age_ms: Some(u64::MAX),
        ..SessionConfig::default()
    };
    let orchestrator = h.orchestrator(config);
    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert_eq!(session.api_credentials().unwrap().key(), "key-cached");
    assert_eq!(h.venue.derive_calls(), 0);
}

#[tokio::test]
async fn store_write_failure_does_not_fail_run() {
    let h = Harness::new();
    h.store.backend().set_fail_writes(true);
    let orchestrator = h.orchestrator(SessionConfig::default());

    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();
    assert!(session.is_complete());
    let key = tradekey_store::session_key(h.eoa);
    assert!(h.store.backend().get(&key).unwrap().is_none());
}

#[tokio::test]
async fn end_session_clears_store_and_status() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(SessionConfig::default());
    orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    orchestrator.end_session(h.eoa);
    assert!(h.store.load(h.eoa).is_none());

    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Idle);
    assert!(status.error.is_none());
    assert!(status.session.is_none());

    // Idempotent, also for unknown EOAs
    orchestrator.end_session(h.eoa);
    orchestrator.end_session(Address::repeat_byte(0x99));
}

#[tokio::test]
async fn abandoned_run_is_not_resumed_after_end_session() {
    let h = Harness::new();
    h.seed_cached_session(h.safe, NOW_MS);
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);
    h.executor.set_latency(Duration::from_millis(50));
    let orchestrator = h.orchestrator(SessionConfig::default());

    // Caller gives up while the deployment check is pending
    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        orchestrator.initialize(h.eoa, h.wallet()),
    )
    .await;
    assert!(abandoned.is_err());

    orchestrator.end_session(h.eoa);
    assert!(h.store.load(h.eoa).is_none());

    h.executor.set_latency(Duration::ZERO);
    h.venue.set_derive_reply(VenueReply::Valid(credentials("derived")));
    let session = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap();

    assert_eq!(session.api_credentials().unwrap().key(), "key-derived");
    assert_eq!(h.venue.derive_calls(), 1);
    let stored = h.store.load(h.eoa).unwrap();
    assert_eq!(stored.api_credentials().unwrap().key(), "key-derived");
}

#[tokio::test]
async fn run_superseded_by_end_session_writes_nothing() {
    let h = Harness::new();
    h.seed_cached_session(h.safe, NOW_MS);
    h.executor.mark_deployed(h.safe);
    h.reader.approve_all(&h.chain, h.safe);
    h.executor.set_latency(Duration::from_millis(50));
    let orchestrator = h.orchestrator(SessionConfig::default());

    let run = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let wallet = h.wallet();
        let eoa = h.eoa;
        async move { orchestrator.initialize(eoa, wallet).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    orchestrator.end_session(h.eoa);
    let result = run.await.unwrap();

    assert!(matches!(result, Err(SessionError::Superseded)));
    assert!(h.store.load(h.eoa).is_none());
    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Idle);
    assert!(status.error.is_none());
    assert!(status.session.is_none());
}

struct PanickingReader;

impl ChainReader for PanickingReader {
    fn erc20_allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async { panic!("allowance reader exploded") })
    }

    fn is_approved_for_all(
        &self,
        _token: Address,
        _owner: Address,
        _operator: Address,
    ) -> BoxFuture<'_, ChainResult<bool>> {
        Box::pin(async { panic!("operator reader exploded") })
    }

    fn has_code(&self, _address: Address) -> BoxFuture<'_, ChainResult<bool>> {
        Box::pin(async { Ok(true) })
    }
}

#[tokio::test]
async fn panic_inside_run_is_reported() {
    let h = Harness::new();
    let orchestrator =
        h.orchestrator_with_reader(SessionConfig::default(), Arc::new(PanickingReader));

    let err = orchestrator.initialize(h.eoa, h.wallet()).await.unwrap_err();
    match err {
        SessionError::Unexpected(msg) => assert!(msg.contains("allowance reader exploded")),
        other => panic!("unexpected error: {other:?}"),
    }

    let status = orchestrator.status(h.eoa);
    assert_eq!(status.step, SessionStep::Idle);
    assert!(matches!(status.error, Some(SessionError::Unexpected(_))));
}
