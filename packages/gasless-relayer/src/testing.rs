//! In-memory fakes for the ledger, faucet and sweep strategy seams.

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::LAMPORTS_PER_SOL;
use crate::ledger::{Faucet, Ledger};
use crate::sweep::SweepStrategy;

pub fn sol(amount: f64) -> u64 {
    (amount * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Ledger holding one native balance shared by every address.
#[derive(Default)]
pub struct FakeLedger {
    native: AtomicU64,
    tokens: Mutex<HashMap<Pubkey, u64>>,
    existing: Mutex<HashSet<Pubkey>>,
    submitted: Mutex<Vec<VersionedTransaction>>,
    fail_reads: AtomicBool,
    fail_reads_after: Mutex<Option<usize>>,
    fail_submit: AtomicBool,
    pub reads: AtomicUsize,
}

impl FakeLedger {
    pub fn with_native(lamports: u64) -> Self {
        let ledger = Self::default();
        ledger.native.store(lamports, Ordering::SeqCst);
        ledger
    }

    pub fn credit(&self, lamports: u64) {
        self.native.fetch_add(lamports, Ordering::SeqCst);
    }

    pub fn set_token(&self, account: Pubkey, amount: u64) {
        self.tokens.lock().unwrap().insert(account, amount);
        self.existing.lock().unwrap().insert(account);
    }

    pub fn mark_existing(&self, account: Pubkey) {
        self.existing.lock().unwrap().insert(account);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Let the next `reads` reads succeed and fail every one after that.
    pub fn fail_reads_after(&self, reads: usize) {
        let done = self.reads.load(Ordering::SeqCst);
        *self.fail_reads_after.lock().unwrap() = Some(done + reads);
    }

    pub fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<VersionedTransaction> {
        self.submitted.lock().unwrap().clone()
    }

    fn read(&self) -> Result<(), crate::Error> {
        let done = self.reads.fetch_add(1, Ordering::SeqCst);
        let exhausted = self
            .fail_reads_after
            .lock()
            .unwrap()
            .is_some_and(|limit| done >= limit);
        if exhausted || self.fail_reads.load(Ordering::SeqCst) {
            return Err(crate::Error::Rpc("read timed out".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn native_balance(&self, _address: &Pubkey) -> Result<u64, crate::Error> {
        self.read()?;
        Ok(self.native.load(Ordering::SeqCst))
    }

    async fn token_account_amount(
        &self,
        token_account: &Pubkey,
    ) -> Result<Option<u64>, crate::Error> {
        self.read()?;
        Ok(self.tokens.lock().unwrap().get(token_account).copied())
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, crate::Error> {
        self.read()?;
        Ok(self.existing.lock().unwrap().contains(address))
    }

    async fn latest_blockhash(&self) -> Result<Hash, crate::Error> {
        self.read()?;
        Ok(Hash::new_unique())
    }

    async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, crate::Error> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(crate::Error::Rpc("simulation failed".into()));
        }
        self.submitted.lock().unwrap().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }

    async fn health_check(&self) -> Result<&'static str, crate::Error> {
        self.read()?;
        Ok("ok")
    }
}

/// Faucet that credits a [`FakeLedger`]. Credits the requested amount unless
/// a fixed grant is configured.
pub struct FakeFaucet {
    ledger: Arc<FakeLedger>,
    grant: Mutex<Option<u64>>,
    fail: AtomicBool,
    delay: Mutex<Duration>,
    pub requests: Mutex<Vec<u64>>,
}

impl FakeFaucet {
    pub fn new(ledger: Arc<FakeLedger>) -> Self {
        Self {
            ledger,
            grant: Mutex::new(None),
            fail: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn grant(&self, lamports: u64) {
        *self.grant.lock().unwrap() = Some(lamports);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Faucet for FakeFaucet {
    async fn request(&self, _recipient: &Pubkey, lamports: u64) -> Result<Signature, crate::Error> {
        self.requests.lock().unwrap().push(lamports);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(crate::Error::Faucet("rate limited".into()));
        }
        let credited = self.grant.lock().unwrap().unwrap_or(lamports);
        self.ledger.credit(credited);
        Ok(Signature::default())
    }
}

/// Strategy with scripted probe/execute results and call counters.
pub struct FakeStrategy {
    name: &'static str,
    available: bool,
    executes: bool,
    pub probes: AtomicUsize,
    pub executed: Mutex<Vec<u64>>,
}

impl FakeStrategy {
    pub fn new(name: &'static str, available: bool, executes: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            available,
            executes,
            probes: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        })
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> Vec<u64> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SweepStrategy for FakeStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self, _canary: u64) -> Result<(), crate::Error> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.available {
            Ok(())
        } else {
            Err(crate::Error::Quote(format!("{} unavailable", self.name)))
        }
    }

    async fn execute(&self, amount: u64) -> Result<String, crate::Error> {
        self.executed.lock().unwrap().push(amount);
        if self.executes {
            Ok(format!("{}-sig", self.name))
        } else {
            Err(crate::Error::Sweep(format!("{} execution failed", self.name)))
        }
    }
}
