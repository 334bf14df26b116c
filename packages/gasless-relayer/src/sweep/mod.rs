//! Fee-token disposal.
//!
//! Strategies are tried in a fixed order of preference (pool swap, aggregator
//! swap, direct transfer). The first one whose probe succeeds is executed, and
//! nothing else is: an execution failure is recorded, never handed to the
//! next strategy, so the same tokens cannot be disposed of twice.

pub mod aggregator;
pub mod pool;
pub mod transfer;

use async_trait::async_trait;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, SweepConfig};
use crate::ledger::Ledger;
use crate::metrics::METRICS;
use crate::wallet::CustodialWallet;

pub use aggregator::AggregatorSwap;
pub use pool::PoolSwap;
pub use transfer::DirectTransfer;

const QUOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A way of disposing of excess fee tokens.
#[async_trait]
pub trait SweepStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap availability check with a small canary amount. Moves no funds.
    async fn probe(&self, canary: u64) -> Result<(), crate::Error>;

    /// Dispose of `amount` base units. Returns a transaction signature.
    async fn execute(&self, amount: u64) -> Result<String, crate::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub strategy: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SweepAction {
    /// Excess at or below threshold.
    NoOp,
    Executed {
        strategy: &'static str,
        amount: u64,
        signature: String,
    },
    DryRun {
        strategy: &'static str,
        amount: u64,
    },
    Failed {
        strategy: &'static str,
        amount: u64,
        error: String,
    },
    /// Every probe failed.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepDecision {
    pub balance: u64,
    pub reserve: u64,
    pub excess: u64,
    pub probes: Vec<ProbeResult>,
    #[serde(flatten)]
    pub action: SweepAction,
}

pub struct SweepSelector {
    strategies: Vec<Arc<dyn SweepStrategy>>,
    threshold: u64,
    canary: u64,
    dry_run: bool,
}

impl SweepSelector {
    /// `strategies` in order of preference; the last should always probe available.
    pub fn new(
        strategies: Vec<Arc<dyn SweepStrategy>>,
        config: &SweepConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            strategies,
            threshold: config.threshold_amount,
            canary: config.canary_amount,
            dry_run,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn should_sweep(&self, balance: u64, reserve: u64) -> bool {
        balance.saturating_sub(reserve) > self.threshold
    }

    pub async fn sweep(&self, balance: u64, reserve: u64) -> SweepDecision {
        let excess = balance.saturating_sub(reserve);
        let mut decision = SweepDecision {
            balance,
            reserve,
            excess,
            probes: Vec::new(),
            action: SweepAction::NoOp,
        };
        if excess <= self.threshold {
            METRICS.sweep_noop.fetch_add(1, Ordering::Relaxed);
            return decision;
        }

        let canary = self.canary.min(excess);
        let mut chosen = None;
        for strategy in &self.strategies {
            match strategy.probe(canary).await {
                Ok(()) => {
                    info!(strategy = strategy.name(), "Sweep strategy available");
                    decision.probes.push(ProbeResult {
                        strategy: strategy.name(),
                        available: true,
                        error: None,
                    });
                    chosen = Some(strategy);
                    break;
                }
                Err(e) => {
                    info!(strategy = strategy.name(), error = %e, "Sweep strategy unavailable");
                    decision.probes.push(ProbeResult {
                        strategy: strategy.name(),
                        available: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let Some(strategy) = chosen else {
            warn!(excess, "No sweep strategy available");
            METRICS.sweep_failures.fetch_add(1, Ordering::Relaxed);
            decision.action = SweepAction::Unavailable;
            return decision;
        };

        if self.dry_run {
            info!(strategy = strategy.name(), amount = excess, "Dry run: sweep not executed");
            METRICS.sweep_dry_run.fetch_add(1, Ordering::Relaxed);
            decision.action = SweepAction::DryRun {
                strategy: strategy.name(),
                amount: excess,
            };
            return decision;
        }

        decision.action = match strategy.execute(excess).await {
            Ok(signature) => {
                info!(strategy = strategy.name(), amount = excess, %signature, "Sweep executed");
                METRICS.record_sweep(strategy.name());
                SweepAction::Executed {
                    strategy: strategy.name(),
                    amount: excess,
                    signature,
                }
            }
            Err(e) => {
                warn!(strategy = strategy.name(), amount = excess, error = %e, "Sweep execution failed");
                METRICS.sweep_failures.fetch_add(1, Ordering::Relaxed);
                SweepAction::Failed {
                    strategy: strategy.name(),
                    amount: excess,
                    error: e.to_string(),
                }
            }
        };
        decision
    }
}

/// Shared collaborators of the concrete strategies.
#[derive(Clone)]
pub struct SweepContext {
    pub wallet: Arc<CustodialWallet>,
    pub ledger: Arc<dyn Ledger>,
    pub http: reqwest::Client,
    pub token_mint: Pubkey,
    pub token_decimals: u8,
    pub slippage_bps: u16,
}

impl SweepContext {
    /// Sign a transaction prepared by a swap service and submit it.
    async fn sign_and_submit(&self, tx: VersionedTransaction) -> Result<String, crate::Error> {
        let signed = self.wallet.sign_prepared(tx)?;
        let signature = self.ledger.submit(&signed).await?;
        Ok(signature.to_string())
    }
}

pub fn http_client() -> Result<reqwest::Client, crate::Error> {
    reqwest::Client::builder()
        .timeout(QUOTE_REQUEST_TIMEOUT)
        .connect_timeout(QUOTE_CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))
}

/// Production strategy chain: pool swap, aggregator swap, direct transfer.
pub fn default_strategies(
    config: &Config,
    ctx: SweepContext,
) -> Result<Vec<Arc<dyn SweepStrategy>>, crate::Error> {
    let strategies: Vec<Arc<dyn SweepStrategy>> = vec![
        Arc::new(PoolSwap::new(ctx.clone(), &config.pool_service_url)),
        Arc::new(AggregatorSwap::new(ctx.clone(), &config.aggregator_url)),
        Arc::new(DirectTransfer::new(ctx, config.operator()?)),
    ];
    Ok(strategies)
}

pub(crate) fn decode_wire_transaction(bytes: &[u8]) -> Result<VersionedTransaction, crate::Error> {
    bincode::deserialize(bytes)
        .map_err(|e| crate::Error::Quote(format!("Malformed swap transaction: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sol, FakeStrategy};

    fn selector(strategies: &[&Arc<FakeStrategy>], dry_run: bool) -> SweepSelector {
        let chain = strategies
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn SweepStrategy>)
            .collect();
        SweepSelector::new(chain, &SweepConfig::default(), dry_run)
    }

    #[tokio::test]
    async fn test_below_threshold_is_noop_without_probes() {
        let pool = FakeStrategy::new("pool_swap", true, true);
        let fallback = FakeStrategy::new("direct_transfer", true, true);
        let s = selector(&[&pool, &fallback], false);

        for balance in [0, sol(0.4), sol(1.5)] {
            let decision = s.sweep(balance, sol(0.5)).await;
            assert_eq!(decision.action, SweepAction::NoOp);
            assert!(decision.probes.is_empty());
        }
        assert_eq!(pool.probe_count() + fallback.probe_count(), 0);
        assert!(pool.executions().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_transfer_of_full_excess() {
        let pool = FakeStrategy::new("pool_swap", false, true);
        let aggregator = FakeStrategy::new("aggregator_swap", false, true);
        let fallback = FakeStrategy::new("direct_transfer", true, true);
        let s = selector(&[&pool, &aggregator, &fallback], false);

        let decision = s.sweep(sol(2.0), sol(0.5)).await;
        assert_eq!(decision.excess, sol(1.5));
        assert_eq!(
            decision.action,
            SweepAction::Executed {
                strategy: "direct_transfer",
                amount: sol(1.5),
                signature: "direct_transfer-sig".into(),
            }
        );
        assert_eq!(decision.probes.len(), 3);
        assert!(pool.executions().is_empty());
        assert!(aggregator.executions().is_empty());
        assert_eq!(fallback.executions(), vec![sol(1.5)]);
    }

    #[tokio::test]
    async fn test_pool_success_skips_others() {
        let pool = FakeStrategy::new("pool_swap", true, true);
        let aggregator = FakeStrategy::new("aggregator_swap", true, true);
        let fallback = FakeStrategy::new("direct_transfer", true, true);
        let s = selector(&[&pool, &aggregator, &fallback], false);

        let decision = s.sweep(sol(3.0), sol(0.5)).await;
        assert!(matches!(decision.action, SweepAction::Executed { strategy: "pool_swap", .. }));
        assert_eq!(pool.executions(), vec![sol(2.5)]);
        assert_eq!(aggregator.probe_count(), 0);
        assert_eq!(fallback.probe_count(), 0);
        assert!(aggregator.executions().is_empty());
        assert!(fallback.executions().is_empty());
    }

    #[tokio::test]
    async fn test_execution_failure_is_not_retried() {
        let pool = FakeStrategy::new("pool_swap", true, false);
        let fallback = FakeStrategy::new("direct_transfer", true, true);
        let s = selector(&[&pool, &fallback], false);

        let decision = s.sweep(sol(2.0), sol(0.5)).await;
        assert!(matches!(decision.action, SweepAction::Failed { strategy: "pool_swap", .. }));
        assert_eq!(pool.executions().len(), 1);
        assert_eq!(fallback.probe_count(), 0);
        assert!(fallback.executions().is_empty());
    }

    #[tokio::test]
    async fn test_all_probes_failing_is_unavailable() {
        let pool = FakeStrategy::new("pool_swap", false, true);
        let aggregator = FakeStrategy::new("aggregator_swap", false, true);
        let s = selector(&[&pool, &aggregator], false);

        let decision = s.sweep(sol(2.0), sol(0.5)).await;
        assert_eq!(decision.action, SweepAction::Unavailable);
        assert_eq!(decision.probes.len(), 2);
        assert!(pool.executions().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_probes_but_does_not_execute() {
        let pool = FakeStrategy::new("pool_swap", false, true);
        let fallback = FakeStrategy::new("direct_transfer", true, true);
        let s = selector(&[&pool, &fallback], true);

        let decision = s.sweep(sol(2.0), sol(0.5)).await;
        assert_eq!(
            decision.action,
            SweepAction::DryRun {
                strategy: "direct_transfer",
                amount: sol(1.5)
            }
        );
        assert_eq!(pool.probe_count(), 1);
        assert!(fallback.executions().is_empty());
    }

    #[test]
    fn test_decision_serializes_flat() {
        let decision = SweepDecision {
            balance: 3,
            reserve: 1,
            excess: 2,
            probes: vec![],
            action: SweepAction::DryRun {
                strategy: "pool_swap",
                amount: 2,
            },
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "dry_run");
        assert_eq!(json["strategy"], "pool_swap");
        assert_eq!(json["excess"], 2);
    }
}
