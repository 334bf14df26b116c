//! Ledger access: the `Ledger`/`Faucet` seams and an RPC client with
//! primary → fallback failover and circuit breaker.

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::metrics::METRICS;

const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

/// Read and write access to ledger state.
///
/// Every read goes to the network; implementations must not cache balances.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn native_balance(&self, address: &Pubkey) -> Result<u64, crate::Error>;

    /// Amount held by an SPL token account, `None` if the account does not exist.
    async fn token_account_amount(&self, token_account: &Pubkey)
        -> Result<Option<u64>, crate::Error>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, crate::Error>;

    async fn latest_blockhash(&self) -> Result<Hash, crate::Error>;

    /// Simulate, then submit and wait for confirmation.
    async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, crate::Error>;

    /// Returns "ok", "degraded", or error.
    async fn health_check(&self) -> Result<&'static str, crate::Error>;
}

/// External native-currency top-up capability.
#[async_trait]
pub trait Faucet: Send + Sync {
    async fn request(&self, recipient: &Pubkey, lamports: u64) -> Result<Signature, crate::Error>;
}

// --- Circuit breaker ---

#[derive(Debug, Default)]
struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// Consecutive-failure breaker guarding the primary endpoint.
#[derive(Debug, Default)]
pub(crate) struct CircuitBreaker {
    state: Mutex<CircuitState>,
    total_trips: AtomicU64,
}

impl CircuitBreaker {
    /// Returns true when the primary just recovered from failures.
    fn record_success(&self) -> bool {
        let mut circuit = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            circuit.failures = 0;
            circuit.open = false;
            return true;
        }
        false
    }

    /// Returns true when this failure tripped the breaker.
    fn record_failure(&self, now_ms: u64) -> bool {
        let mut circuit = self.state.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms;
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_trips.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Open breakers half-open once the window has passed since the last failure.
    fn is_open(&self, now_ms: u64) -> bool {
        let mut circuit = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        if now_ms.saturating_sub(circuit.last_failure_ms) > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            return false;
        }
        true
    }

    fn trips(&self) -> u64 {
        self.total_trips.load(Ordering::Relaxed)
    }
}

/// Solana RPC ledger with primary → fallback failover.
pub struct RpcLedger {
    primary: RpcClient,
    fallback: RpcClient,
    primary_url: String,
    fallback_url: String,
    circuit: CircuitBreaker,
}

impl RpcLedger {
    pub fn new(primary_url: &str, fallback_url: &str) -> Self {
        info!(
            primary = primary_url,
            fallback = fallback_url,
            "RPC ledger initialized with failover"
        );
        Self {
            primary: RpcClient::new_with_commitment(
                primary_url.to_string(),
                CommitmentConfig::confirmed(),
            ),
            fallback: RpcClient::new_with_commitment(
                fallback_url.to_string(),
                CommitmentConfig::confirmed(),
            ),
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            circuit: CircuitBreaker::default(),
        }
    }

    /// Endpoint selected by the breaker; `true` when it is the fallback.
    fn active(&self) -> (&RpcClient, bool) {
        if self.circuit.is_open(now_ms()) {
            (&self.fallback, true)
        } else {
            (&self.primary, false)
        }
    }

    /// Run a read-only `op` against the active client, retrying once on the
    /// other one. Writes go through [`RpcLedger::active`] only.
    async fn call<'a, T, F, Fut>(&'a self, what: &str, op: F) -> Result<T, crate::Error>
    where
        F: Fn(&'a RpcClient) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let (first, on_fallback) = self.active();
        let second = if on_fallback {
            &self.primary
        } else {
            &self.fallback
        };
        match op(first).await {
            Ok(v) => {
                if !on_fallback && self.circuit.record_success() {
                    info!(primary = %self.primary_url, "Primary RPC recovered");
                }
                Ok(v)
            }
            Err(e) => {
                if !on_fallback {
                    self.record_failure();
                } else {
                    METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
                }
                warn!(error = %e, op = what, "RPC call failed, trying other endpoint");
                op(second).await.map_err(|e2| {
                    METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
                    crate::Error::Rpc(format!("{what} failed on both RPCs: first={e}, second={e2}"))
                })
            }
        }
    }

    fn record_failure(&self) {
        METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
        if self.circuit.record_failure(now_ms()) {
            METRICS.rpc_failovers.fetch_add(1, Ordering::Relaxed);
            warn!(
                fallback = %self.fallback_url,
                trips = self.circuit.trips(),
                "Circuit breaker opened, routing to fallback"
            );
        }
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn native_balance(&self, address: &Pubkey) -> Result<u64, crate::Error> {
        self.call("get_balance", |c| c.get_balance(address)).await
    }

    async fn token_account_amount(
        &self,
        token_account: &Pubkey,
    ) -> Result<Option<u64>, crate::Error> {
        let account = self
            .call("get_account", |c| {
                c.get_account_with_commitment(token_account, CommitmentConfig::confirmed())
            })
            .await?
            .value;
        match account {
            None => Ok(None),
            Some(account) => {
                let state = spl_token::state::Account::unpack(&account.data).map_err(|e| {
                    crate::Error::Rpc(format!("{token_account} is not a token account: {e}"))
                })?;
                Ok(Some(state.amount))
            }
        }
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, crate::Error> {
        let account = self
            .call("get_account", |c| {
                c.get_account_with_commitment(address, CommitmentConfig::confirmed())
            })
            .await?;
        Ok(account.value.is_some())
    }

    async fn latest_blockhash(&self) -> Result<Hash, crate::Error> {
        self.call("get_latest_blockhash", |c| c.get_latest_blockhash())
            .await
    }

    async fn submit(&self, tx: &VersionedTransaction) -> Result<Signature, crate::Error> {
        let simulation = self
            .call("simulate_transaction", |c| c.simulate_transaction(tx))
            .await?
            .value;
        if let Some(err) = simulation.err {
            debug!(logs = ?simulation.logs, "Simulation logs");
            return Err(crate::Error::Rpc(format!("simulation failed: {err}")));
        }
        let (client, on_fallback) = self.active();
        let signature = client
            .send_and_confirm_transaction(tx)
            .await
            .map_err(|e| {
                if on_fallback {
                    METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.record_failure();
                }
                crate::Error::Rpc(format!("send_and_confirm_transaction failed: {e}"))
            })?;
        info!(%signature, "Transaction confirmed");
        Ok(signature)
    }

    async fn health_check(&self) -> Result<&'static str, crate::Error> {
        match self.primary.get_health().await {
            Ok(()) => Ok("ok"),
            Err(_) => match self.fallback.get_health().await {
                Ok(()) => Ok("degraded"),
                Err(e) => Err(crate::Error::Rpc(format!("Both RPCs unreachable: {e}"))),
            },
        }
    }
}

#[async_trait]
impl Faucet for RpcLedger {
    async fn request(&self, recipient: &Pubkey, lamports: u64) -> Result<Signature, crate::Error> {
        // Airdrops are not replayed on the fallback; a second grant would overshoot the cap.
        let (client, _) = self.active();
        client
            .request_airdrop(recipient, lamports)
            .await
            .map_err(|e| crate::Error::Faucet(e.to_string()))
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
