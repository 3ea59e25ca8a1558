//! In-memory chain and relay collaborators for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use tradekey_core::{ApprovalKind, BoxFuture, ChainConfig};

use crate::error::{ChainError, ChainResult, RelayError, RelayResult};
use crate::reader::ChainReader;
use crate::relay::{RelayCall, RelayExecutor, RelayHandle, RelayReceipt, RelayState};

type PairKey = (Address, Address, Address);

/// Mock chain reader backed by in-memory tables.
///
/// Unset allowances read as zero and unset operator approvals as false.
#[derive(Debug, Default)]
pub struct MockChainReader {
    allowances: Mutex<HashMap<PairKey, U256>>,
    approvals_for_all: Mutex<HashMap<PairKey, bool>>,
    code: Mutex<HashSet<Address>>,
    fail_reads: AtomicBool,
    reads: AtomicUsize,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.lock().insert((token, owner, spender), amount);
    }

    pub fn set_approved_for_all(
        &self,
        token: Address,
        owner: Address,
        operator: Address,
        approved: bool,
    ) {
        self.approvals_for_all
            .lock()
            .insert((token, owner, operator), approved);
    }

    /// Grant every requirement of `chain` for `owner`.
    pub fn approve_all(&self, chain: &ChainConfig, owner: Address) {
        for req in chain.approval_requirements() {
            match req.kind {
                ApprovalKind::Erc20Allowance => {
                    self.set_allowance(req.token, owner, req.spender, U256::MAX)
                }
                ApprovalKind::Erc1155ApprovalForAll => {
                    self.set_approved_for_all(req.token, owner, req.spender, true)
                }
            }
        }
    }

    pub fn set_code(&self, address: Address, present: bool) {
        let mut code = self.code.lock();
        if present {
            code.insert(address);
        } else {
            code.remove(&address);
        }
    }

    /// Make every read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn begin_read(&self) -> ChainResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ChainError::HttpClient("mock read failure".to_string()));
        }
        Ok(())
    }
}

impl ChainReader for MockChainReader {
    fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> BoxFuture<'_, ChainResult<U256>> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self
                .allowances
                .lock()
                .get(&(token, owner, spender))
                .copied()
                .unwrap_or(U256::ZERO))
        })
    }

    fn is_approved_for_all(
        &self,
        token: Address,
        owner: Address,
        operator: Address,
    ) -> BoxFuture<'_, ChainResult<bool>> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self
                .approvals_for_all
                .lock()
                .get(&(token, owner, operator))
                .copied()
                .unwrap_or(false))
        })
    }

    fn has_code(&self, address: Address) -> BoxFuture<'_, ChainResult<bool>> {
        Box::pin(async move {
            self.begin_read()?;
            Ok(self.code.lock().contains(&address))
        })
    }
}

/// Mock relay executor.
///
/// `deploy` marks the configured proxy address deployed (unless disabled via
/// `set_deploy_takes_effect(false)`); `execute` records batches.
#[derive(Debug)]
pub struct MockRelayExecutor {
    proxy_address: Address,
    deployed: Mutex<HashSet<Address>>,
    executions: Mutex<Vec<(Vec<RelayCall>, String)>>,
    deploy_takes_effect: AtomicBool,
    get_deployed_error: Mutex<Option<RelayError>>,
    deploy_error: Mutex<Option<RelayError>>,
    fail_execute: AtomicBool,
    latency: Mutex<Duration>,
    deploy_count: AtomicUsize,
    get_deployed_count: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockRelayExecutor {
    /// Create an executor whose `deploy` creates `proxy_address`.
    pub fn new(proxy_address: Address) -> Self {
        Self {
            proxy_address,
            deployed: Mutex::new(HashSet::new()),
            executions: Mutex::new(Vec::new()),
            deploy_takes_effect: AtomicBool::new(true),
            get_deployed_error: Mutex::new(None),
            deploy_error: Mutex::new(None),
            fail_execute: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            deploy_count: AtomicUsize::new(0),
            get_deployed_count: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn mark_deployed(&self, address: Address) {
        self.deployed.lock().insert(address);
    }

    /// When false, `deploy` settles but the wallet never shows as deployed.
    pub fn set_deploy_takes_effect(&self, takes_effect: bool) {
        self.deploy_takes_effect.store(takes_effect, Ordering::SeqCst);
    }

    pub fn set_get_deployed_error(&self, error: Option<RelayError>) {
        *self.get_deployed_error.lock() = error;
    }

    pub fn set_deploy_error(&self, error: Option<RelayError>) {
        *self.deploy_error.lock() = error;
    }

    pub fn set_fail_execute(&self, fail: bool) {
        self.fail_execute.store(fail, Ordering::SeqCst);
    }

    /// Delay applied to every remote call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Recorded `(calls, description)` batches.
    pub fn executions(&self) -> Vec<(Vec<RelayCall>, String)> {
        self.executions.lock().clone()
    }

    pub fn deploy_count(&self) -> usize {
        self.deploy_count.load(Ordering::SeqCst)
    }

    pub fn get_deployed_count(&self) -> usize {
        self.get_deployed_count.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_handle(&self, proxy_address: Option<Address>) -> RelayHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        RelayHandle {
            transaction_id: format!("mock-tx-{id}"),
            proxy_address,
        }
    }
}

impl RelayExecutor for MockRelayExecutor {
    fn get_deployed(&self, safe: Address) -> BoxFuture<'_, RelayResult<bool>> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.get_deployed_count.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.get_deployed_error.lock().clone() {
                return Err(err);
            }
            Ok(self.deployed.lock().contains(&safe))
        })
    }

    fn deploy(&self) -> BoxFuture<'_, RelayResult<RelayHandle>> {
        Box::pin(async move {
            self.simulate_latency().await;
            self.deploy_count.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.deploy_error.lock().clone() {
                return Err(err);
            }
            if self.deploy_takes_effect.load(Ordering::SeqCst) {
                self.mark_deployed(self.proxy_address);
            }
            Ok(self.next_handle(Some(self.proxy_address)))
        })
    }

    fn execute(
        &self,
        calls: Vec<RelayCall>,
        description: String,
    ) -> BoxFuture<'_, RelayResult<RelayHandle>> {
        Box::pin(async move {
            self.simulate_latency().await;
            if self.fail_execute.load(Ordering::SeqCst) {
                return Err(RelayError::Rejected {
                    status: 500,
                    body: "mock execute failure".to_string(),
                });
            }
            self.executions.lock().push((calls, description));
            Ok(self.next_handle(None))
        })
    }

    fn wait<'a>(&'a self, handle: &'a RelayHandle) -> BoxFuture<'a, RelayResult<RelayReceipt>> {
        Box::pin(async move {
            self.simulate_latency().await;
            Ok(RelayReceipt {
                transaction_id: handle.transaction_id.clone(),
                transaction_hash: None,
                state: RelayState::Confirmed,
            })
        })
    }
}
