//! Per-request solvency gate for fee-paying relay requests.

use serde::Serialize;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

use crate::config::AdmissionConfig;
use crate::inspector::BalanceInspector;
use crate::metrics::METRICS;
use crate::replenish::{ReplenishmentPolicy, ReplenishmentTarget};

/// Returned to clients on deny; never carries balances or upstream errors.
pub const OUT_OF_FUNDS_REASON: &str =
    "Relayer is temporarily unable to pay network fees, please retry later";
pub const UNAVAILABLE_REASON: &str = "Relayer balance check unavailable, please retry later";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AdmissionDecision {
    fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allow: false,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionGate {
    inspector: BalanceInspector,
    replenisher: ReplenishmentPolicy,
    recovery: ReplenishmentTarget,
    fail_open: bool,
}

impl AdmissionGate {
    /// The emergency top-up requests any deficit, however small, so a gate
    /// invocation below the critical floor always makes exactly one attempt.
    pub fn new(
        inspector: BalanceInspector,
        replenisher: ReplenishmentPolicy,
        config: &AdmissionConfig,
        max_top_up: u64,
    ) -> Result<Self, crate::Error> {
        let recovery = ReplenishmentTarget::new(
            config.critical_floor_lamports,
            config.recovery_target_lamports,
            max_top_up,
        )?;
        Ok(Self {
            inspector,
            replenisher: replenisher.with_min_top_up(0),
            recovery,
            fail_open: config.fail_open,
        })
    }

    pub async fn check_admission(&self) -> AdmissionDecision {
        let balance = match self.inspector.native_balance().await {
            Ok(b) => b,
            Err(e) if self.fail_open => {
                METRICS.gate_fail_open.fetch_add(1, Ordering::Relaxed);
                METRICS.gate_allowed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Balance read failed, admitting request (fail-open)");
                return AdmissionDecision::allow();
            }
            Err(e) => {
                METRICS.gate_denied.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Balance read failed, denying request (fail-closed)");
                return AdmissionDecision::deny(UNAVAILABLE_REASON);
            }
        };

        if !self.recovery.is_below_floor(balance) {
            METRICS.gate_allowed.fetch_add(1, Ordering::Relaxed);
            return AdmissionDecision::allow();
        }

        METRICS.gate_emergency.fetch_add(1, Ordering::Relaxed);
        warn!(
            balance,
            critical_floor = self.recovery.floor(),
            "Balance below critical floor, attempting emergency top-up"
        );
        let outcome = self.replenisher.replenish_from(balance, &self.recovery).await;
        if outcome.success {
            METRICS.gate_allowed.fetch_add(1, Ordering::Relaxed);
            info!(resulting = ?outcome.resulting_balance, "Emergency top-up succeeded");
            AdmissionDecision::allow()
        } else {
            METRICS.gate_denied.fetch_add(1, Ordering::Relaxed);
            warn!(
                resulting = ?outcome.resulting_balance,
                error = ?outcome.error,
                "Emergency top-up failed, denying request"
            );
            AdmissionDecision::deny(OUT_OF_FUNDS_REASON)
        }
    }
}
