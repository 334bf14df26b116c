//! Fund manager cycle and its recurring scheduler.
//!
//! A cycle is inspect → replenish (below floor) → sweep (excess above
//! threshold) → surplus distribution → report. Cycles never overlap: the
//! timer and manual triggers share one in-flight flag, and a tick or trigger
//! that finds a cycle running is skipped.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::inspector::{BalanceInspector, WalletResourceState};
use crate::ledger::now_ms;
use crate::metrics::METRICS;
use crate::replenish::{ReplenishmentOutcome, ReplenishmentPolicy, ReplenishmentTarget};
use crate::surplus::{SurplusDistributor, SurplusOutcome};
use crate::sweep::{SweepDecision, SweepSelector};

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceCycleReport {
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub before: WalletResourceState,
    /// `None` when the closing re-read failed.
    pub after: Option<WalletResourceState>,
    pub replenishment: Option<ReplenishmentOutcome>,
    pub sweep: Option<SweepDecision>,
    pub surplus: Option<SurplusOutcome>,
}

/// One maintenance pass over the custodial wallet.
pub struct FundManager {
    inspector: BalanceInspector,
    replenisher: ReplenishmentPolicy,
    target: ReplenishmentTarget,
    sweeper: SweepSelector,
    reserve: u64,
    surplus: Option<SurplusDistributor>,
}

impl FundManager {
    pub fn new(
        inspector: BalanceInspector,
        replenisher: ReplenishmentPolicy,
        target: ReplenishmentTarget,
        sweeper: SweepSelector,
        reserve: u64,
        surplus: Option<SurplusDistributor>,
    ) -> Self {
        Self {
            inspector,
            replenisher,
            target,
            sweeper,
            reserve,
            surplus,
        }
    }

    /// Errors only when the opening balance read fails; every later step
    /// records its outcome in the report instead.
    pub async fn run_cycle(&self) -> Result<MaintenanceCycleReport, crate::Error> {
        let started_at_ms = now_ms();
        let before = self.inspector.inspect().await?;
        info!(
            native = before.native_lamports,
            token = before.token_amount,
            "Maintenance cycle: balances read"
        );

        let replenishment = if self.target.is_below_floor(before.native_lamports) {
            Some(self.replenisher.replenish(&self.target).await)
        } else {
            None
        };

        let sweep = if self.sweeper.should_sweep(before.token_amount, self.reserve) {
            Some(self.sweeper.sweep(before.token_amount, self.reserve).await)
        } else {
            None
        };

        let after = match self.inspector.inspect().await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, "Closing balance read failed");
                None
            }
        };

        let surplus = match (&self.surplus, &after) {
            (Some(distributor), Some(state)) => distributor.distribute(state.native_lamports).await,
            _ => None,
        };

        Ok(MaintenanceCycleReport {
            started_at_ms,
            finished_at_ms: now_ms(),
            before,
            after,
            replenishment,
            sweep,
            surplus,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub next_cycle_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    #[serde(rename = "triggered")]
    Started,
    /// A cycle was already in flight; nothing was started.
    Busy,
}

#[derive(Default)]
struct TimerState {
    running: bool,
    next_cycle_at_ms: Option<u64>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    manager: FundManager,
    period: Duration,
    in_flight: AtomicBool,
    timer: Mutex<TimerState>,
    last_report: Mutex<Option<MaintenanceCycleReport>>,
    completed: AtomicU64,
}

/// Releases the in-flight flag on drop, including on panic.
struct InFlight(Arc<Inner>);

impl InFlight {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(inner)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Owns the recurring maintenance timer. Cheap to clone.
#[derive(Clone)]
pub struct MaintenanceScheduler {
    inner: Arc<Inner>,
}

impl MaintenanceScheduler {
    pub fn new(manager: FundManager, period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager,
                period,
                in_flight: AtomicBool::new(false),
                timer: Mutex::new(TimerState::default()),
                last_report: Mutex::new(None),
                completed: AtomicU64::new(0),
            }),
        }
    }

    /// Arm the timer; the first cycle runs right away. Returns false (and does
    /// nothing) when already running.
    pub fn start(&self) -> bool {
        let mut timer = self.inner.lock_timer();
        if timer.running {
            debug!("Maintenance scheduler already running");
            return false;
        }
        let cancel = CancellationToken::new();
        timer.running = true;
        timer.next_cycle_at_ms = Some(now_ms());
        timer.cancel = Some(cancel.clone());
        timer.task = Some(tokio::spawn(run_timer(Arc::clone(&self.inner), cancel)));
        info!(period_secs = self.inner.period.as_secs(), "Maintenance scheduler started");
        true
    }

    /// Disarm the timer. A cycle already in flight finishes on its own.
    pub fn stop(&self) {
        let mut timer = self.inner.lock_timer();
        if !timer.running {
            return;
        }
        if let Some(cancel) = timer.cancel.take() {
            cancel.cancel();
        }
        // Detach rather than abort so an in-flight cycle completes.
        timer.task.take();
        timer.running = false;
        timer.next_cycle_at_ms = None;
        info!("Maintenance scheduler stopped");
    }

    pub fn status(&self) -> SchedulerStatus {
        let timer = self.inner.lock_timer();
        SchedulerStatus {
            running: timer.running,
            next_cycle_at_ms: timer.next_cycle_at_ms,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_timer().running
    }

    /// Request an out-of-band cycle without waiting for it.
    pub fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = InFlight::acquire(&self.inner) else {
            METRICS.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            info!("Manual trigger ignored: cycle in flight");
            return TriggerOutcome::Busy;
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_cycle("trigger", guard).await });
        TriggerOutcome::Started
    }

    pub fn last_report(&self) -> Option<MaintenanceCycleReport> {
        self.inner
            .last_report
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cycles that ran to completion (successfully or not) on this instance.
    pub fn completed_cycles(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }
}

impl Inner {
    fn lock_timer(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs one cycle and releases `guard` before counting it as completed.
    async fn run_cycle(&self, source: &'static str, guard: InFlight) {
        let start = Instant::now();
        METRICS.cycles_total.fetch_add(1, Ordering::Relaxed);
        info!(source, "Maintenance cycle started");
        match self.manager.run_cycle().await {
            Ok(report) => {
                info!(
                    source,
                    replenished = report.replenishment.as_ref().map(|r| r.success),
                    swept = report.sweep.is_some(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Maintenance cycle finished"
                );
                *self.last_report.lock().unwrap_or_else(|e| e.into_inner()) = Some(report);
            }
            Err(e) => {
                METRICS.cycles_failed.fetch_add(1, Ordering::Relaxed);
                error!(source, error = %e, "Maintenance cycle failed");
            }
        }
        METRICS.record_cycle_duration(start);
        drop(guard);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

async fn run_timer(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(inner.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        {
            // A later start() may have re-armed `running` with a new token.
            let mut timer = inner.lock_timer();
            if cancel.is_cancelled() || !timer.running {
                break;
            }
            timer.next_cycle_at_ms = Some(now_ms() + inner.period.as_millis() as u64);
        }

        let Some(guard) = InFlight::acquire(&inner) else {
            METRICS.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            info!("Scheduled cycle skipped: previous cycle in flight");
            continue;
        };
        // Run in its own task so a panicking cycle cannot take the timer down.
        let cycle_inner = Arc::clone(&inner);
        let cycle = tokio::spawn(async move { cycle_inner.run_cycle("timer", guard).await });
        if let Err(e) = cycle.await {
            error!(error = %e, "Maintenance cycle panicked");
        }
    }
    debug!("Maintenance timer exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MaintenanceConfig, SweepConfig};
    use crate::sweep::{SweepAction, SweepStrategy};
    use crate::testing::{sol, FakeFaucet, FakeLedger, FakeStrategy};
    use solana_sdk::pubkey::Pubkey;
    use spl_associated_token_account::get_associated_token_address;

    struct Harness {
        ledger: Arc<FakeLedger>,
        faucet: Arc<FakeFaucet>,
        fallback: Arc<FakeStrategy>,
        wallet: Pubkey,
        mint: Pubkey,
    }

    impl Harness {
        fn new(native: u64) -> Self {
            let ledger = Arc::new(FakeLedger::with_native(native));
            Self {
                faucet: Arc::new(FakeFaucet::new(ledger.clone())),
                fallback: FakeStrategy::new("direct_transfer", true, true),
                ledger,
                wallet: Pubkey::new_unique(),
                mint: Pubkey::new_unique(),
            }
        }

        fn manager(&self) -> FundManager {
            let config = MaintenanceConfig {
                settle_delay_ms: 0,
                ..MaintenanceConfig::default()
            };
            let inspector = BalanceInspector::new(self.ledger.clone(), self.wallet, &self.mint);
            let replenisher = ReplenishmentPolicy::new(inspector.clone(), self.faucet.clone(), &config);
            let target = ReplenishmentTarget::new(
                config.floor_lamports,
                config.target_lamports,
                config.max_top_up_lamports,
            )
            .unwrap();
            let chain = vec![self.fallback.clone() as Arc<dyn SweepStrategy>];
            let sweeper = SweepSelector::new(chain, &SweepConfig::default(), false);
            FundManager::new(inspector, replenisher, target, sweeper, SweepConfig::default().reserve_amount, None)
        }

        fn set_tokens(&self, amount: u64) {
            self.ledger
                .set_token(get_associated_token_address(&self.wallet, &self.mint), amount);
        }
    }

    async fn wait_for_cycles(scheduler: &MaintenanceScheduler, n: u64) {
        for _ in 0..200 {
            if scheduler.completed_cycles() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} completed cycles, saw {}", scheduler.completed_cycles());
    }

    #[tokio::test]
    async fn test_cycle_replenishes_and_sweeps() {
        let h = Harness::new(sol(0.2));
        h.set_tokens(sol(2.0));
        let report = h.manager().run_cycle().await.unwrap();

        let replenishment = report.replenishment.unwrap();
        assert!(replenishment.success);
        assert_eq!(replenishment.requested, sol(1.8));
        let sweep = report.sweep.unwrap();
        assert!(matches!(sweep.action, SweepAction::Executed { amount, .. } if amount == sol(1.5)));
        assert_eq!(report.after.unwrap().native_lamports, sol(2.0));
        assert!(report.finished_at_ms >= report.started_at_ms);
    }

    #[tokio::test]
    async fn test_healthy_wallet_cycle_does_nothing() {
        let h = Harness::new(sol(1.0));
        h.set_tokens(sol(1.2));
        let report = h.manager().run_cycle().await.unwrap();
        assert!(report.replenishment.is_none());
        assert!(report.sweep.is_none());
        assert_eq!(h.faucet.calls(), 0);
        assert_eq!(h.fallback.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_read_failure_is_error() {
        let h = Harness::new(sol(1.0));
        h.ledger.fail_reads(true);
        assert!(h.manager().run_cycle().await.is_err());
    }

    #[tokio::test]
    async fn test_start_twice_runs_one_cycle() {
        let h = Harness::new(sol(0.2));
        let scheduler = MaintenanceScheduler::new(h.manager(), Duration::from_secs(3600));

        assert!(scheduler.start());
        assert!(!scheduler.start());
        wait_for_cycles(&scheduler, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(scheduler.completed_cycles(), 1);
        assert_eq!(h.faucet.calls(), 1);
        let status = scheduler.status();
        assert!(status.running);
        assert!(status.next_cycle_at_ms.unwrap() > now_ms() + 3_000_000);
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_clears_status() {
        let h = Harness::new(sol(1.0));
        let scheduler = MaintenanceScheduler::new(h.manager(), Duration::from_secs(3600));
        scheduler.stop();
        scheduler.start();
        wait_for_cycles(&scheduler, 1).await;
        scheduler.stop();
        scheduler.stop();
        assert_eq!(
            scheduler.status(),
            SchedulerStatus {
                running: false,
                next_cycle_at_ms: None
            }
        );
        assert!(scheduler.start());
        wait_for_cycles(&scheduler, 2).await;
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_stop_prevents_later_scheduled_cycles() {
        let h = Harness::new(sol(1.0));
        let scheduler = MaintenanceScheduler::new(h.manager(), Duration::from_millis(20));
        scheduler.start();
        wait_for_cycles(&scheduler, 1).await;
        scheduler.stop();
        // Let a cycle that was already in flight finish.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let settled = scheduler.completed_cycles();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(scheduler.completed_cycles(), settled);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_restart_leaves_one_timer() {
        let h = Harness::new(sol(1.0));
        let scheduler = MaintenanceScheduler::new(h.manager(), Duration::from_secs(3600));
        scheduler.start();
        wait_for_cycles(&scheduler, 1).await;
        scheduler.stop();
        scheduler.start();
        wait_for_cycles(&scheduler, 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Only the new timer's immediate tick ran.
        assert_eq!(scheduler.completed_cycles(), 2);
        let next = scheduler.status().next_cycle_at_ms.unwrap();
        assert!(next > now_ms() + 3_000_000);
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_trigger_busy_while_cycle_in_flight() {
        let h = Harness::new(sol(0.2));
        h.faucet.delay(Duration::from_millis(200));
        let scheduler = MaintenanceScheduler::new(h.manager(), Duration::from_secs(3600));

        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        assert_eq!(scheduler.trigger(), TriggerOutcome::Busy);
        wait_for_cycles(&scheduler, 1).await;
        assert_eq!(h.faucet.calls(), 1);
        assert!(!scheduler.is_running());
        assert!(scheduler.last_report().is_some());

        assert_eq!(scheduler.trigger(), TriggerOutcome::Started);
        wait_for_cycles(&scheduler, 2).await;
    }

    #[tokio::test]
    async fn test_failed_cycle_does_not_stop_scheduler() {
        let h = Harness::new(sol(1.0));
        h.ledger.fail_reads(true);
        let scheduler = MaintenanceScheduler::new(h.manager(), Duration::from_millis(30));
        scheduler.start();
        wait_for_cycles(&scheduler, 2).await;
        assert!(scheduler.is_running());
        assert!(scheduler.last_report().is_none());

        h.ledger.fail_reads(false);
        for _ in 0..200 {
            if scheduler.last_report().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(scheduler.last_report().is_some());
        scheduler.stop();
    }
}
