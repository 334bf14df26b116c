//! Native-balance replenishment via an external faucet.
//!
//! One invocation makes at most one faucet request. Retrying is the caller's
//! business: the admission gate retries once per request, the scheduler waits
//! for its next tick.

use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::MaintenanceConfig;
use crate::inspector::BalanceInspector;
use crate::ledger::Faucet;
use crate::metrics::METRICS;

/// Floor, target and per-attempt cap in lamports. `floor < target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplenishmentTarget {
    floor: u64,
    target: u64,
    max_top_up: u64,
}

impl ReplenishmentTarget {
    pub fn new(floor: u64, target: u64, max_top_up: u64) -> Result<Self, crate::Error> {
        if floor >= target {
            return Err(crate::Error::Config(format!(
                "replenishment floor ({floor}) must be below target ({target})"
            )));
        }
        if max_top_up == 0 {
            return Err(crate::Error::Config("max_top_up must be > 0".into()));
        }
        Ok(Self {
            floor,
            target,
            max_top_up,
        })
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn max_top_up(&self) -> u64 {
        self.max_top_up
    }

    pub fn is_below_floor(&self, balance: u64) -> bool {
        balance < self.floor
    }

    /// At least 90% of target.
    pub fn is_reached(&self, balance: u64) -> bool {
        balance as u128 * 10 >= self.target as u128 * 9
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplenishmentOutcome {
    /// Lamports asked of the faucet; zero for a no-op.
    pub requested: u64,
    pub starting_balance: Option<u64>,
    pub resulting_balance: Option<u64>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplenishmentOutcome {
    fn failed(requested: u64, starting_balance: Option<u64>, error: String) -> Self {
        Self {
            requested,
            starting_balance,
            resulting_balance: None,
            success: false,
            error: Some(error),
        }
    }
}

#[derive(Clone)]
pub struct ReplenishmentPolicy {
    inspector: BalanceInspector,
    faucet: Arc<dyn Faucet>,
    safety_margin: u64,
    min_top_up: u64,
    settle_delay: Duration,
}

impl ReplenishmentPolicy {
    pub fn new(
        inspector: BalanceInspector,
        faucet: Arc<dyn Faucet>,
        config: &MaintenanceConfig,
    ) -> Self {
        Self {
            inspector,
            faucet,
            safety_margin: config.safety_margin_lamports,
            min_top_up: config.min_top_up_lamports,
            settle_delay: config.settle_delay(),
        }
    }

    /// Override the no-op threshold. Zero means any deficit is requested.
    pub fn with_min_top_up(mut self, min_top_up: u64) -> Self {
        self.min_top_up = min_top_up;
        self
    }

    /// Top up toward `target`. Failures come back as an unsuccessful outcome.
    pub async fn replenish(&self, target: &ReplenishmentTarget) -> ReplenishmentOutcome {
        let current = match self.inspector.native_balance().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Balance read failed before top-up");
                return ReplenishmentOutcome::failed(0, None, e.to_string());
            }
        };
        self.replenish_from(current, target).await
    }

    /// Top up starting from a balance the caller has just read. Skips the
    /// opening read, so a deficit of at least `min_top_up` always reaches
    /// the faucet exactly once.
    pub async fn replenish_from(
        &self,
        current: u64,
        target: &ReplenishmentTarget,
    ) -> ReplenishmentOutcome {
        let deficit = target.target.saturating_sub(current);
        if deficit < self.min_top_up {
            return ReplenishmentOutcome {
                requested: 0,
                starting_balance: Some(current),
                resulting_balance: Some(current),
                success: true,
                error: None,
            };
        }

        let requested = deficit
            .saturating_add(self.safety_margin)
            .min(target.max_top_up);
        let wallet = self.inspector.wallet();
        info!(
            %wallet,
            current,
            target = target.target,
            requested,
            "Requesting faucet top-up"
        );
        METRICS.top_up_requests.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = self.faucet.request(&wallet, requested).await {
            METRICS.top_up_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, requested, "Faucet top-up failed");
            return ReplenishmentOutcome::failed(requested, Some(current), e.to_string());
        }

        tokio::time::sleep(self.settle_delay).await;

        let resulting = match self.inspector.native_balance().await {
            Ok(b) => b,
            Err(e) => {
                METRICS.top_up_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Balance re-read failed after top-up");
                return ReplenishmentOutcome::failed(requested, Some(current), e.to_string());
            }
        };

        let success = target.is_reached(resulting);
        if success {
            info!(resulting, "Top-up settled");
        } else {
            METRICS.top_up_failures.fetch_add(1, Ordering::Relaxed);
            warn!(resulting, target = target.target, "Top-up fell short of target");
        }
        ReplenishmentOutcome {
            requested,
            starting_balance: Some(current),
            resulting_balance: Some(resulting),
            success,
            error: None,
        }
    }
}
