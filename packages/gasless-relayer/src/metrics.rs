//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Maintenance cycles ---
    pub cycles_total: AtomicU64,
    pub cycles_failed: AtomicU64,
    pub cycles_skipped: AtomicU64,
    pub cycle_duration_us_sum: AtomicU64,
    pub cycle_duration_us_max: AtomicU64,

    // --- Replenishment ---
    pub top_up_requests: AtomicU64,
    pub top_up_failures: AtomicU64,

    // --- Sweep ---
    pub sweep_pool: AtomicU64,
    pub sweep_aggregator: AtomicU64,
    pub sweep_transfer: AtomicU64,
    pub sweep_failures: AtomicU64,
    pub sweep_noop: AtomicU64,
    pub sweep_dry_run: AtomicU64,
    pub surplus_transfers: AtomicU64,

    // --- Admission gate ---
    pub gate_allowed: AtomicU64,
    pub gate_denied: AtomicU64,
    pub gate_fail_open: AtomicU64,
    pub gate_emergency: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,

    // --- Last observation ---
    pub native_lamports: AtomicU64,
    pub token_amount: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            cycle_duration_us_sum: AtomicU64::new(0),
            cycle_duration_us_max: AtomicU64::new(0),
            top_up_requests: AtomicU64::new(0),
            top_up_failures: AtomicU64::new(0),
            sweep_pool: AtomicU64::new(0),
            sweep_aggregator: AtomicU64::new(0),
            sweep_transfer: AtomicU64::new(0),
            sweep_failures: AtomicU64::new(0),
            sweep_noop: AtomicU64::new(0),
            sweep_dry_run: AtomicU64::new(0),
            surplus_transfers: AtomicU64::new(0),
            gate_allowed: AtomicU64::new(0),
            gate_denied: AtomicU64::new(0),
            gate_fail_open: AtomicU64::new(0),
            gate_emergency: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
            native_lamports: AtomicU64::new(0),
            token_amount: AtomicU64::new(0),
        }
    }

    pub fn record_cycle_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.cycle_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        // CAS loop for max tracking
        let mut cur = self.cycle_duration_us_max.load(Ordering::Relaxed);
        while us > cur {
            match self.cycle_duration_us_max.compare_exchange_weak(
                cur,
                us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    pub fn record_sweep(&self, strategy: &str) {
        let counter = match strategy {
            "pool_swap" => &self.sweep_pool,
            "aggregator_swap" => &self.sweep_aggregator,
            _ => &self.sweep_transfer,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_balances(&self, native_lamports: u64, token_amount: u64) {
        self.native_lamports.store(native_lamports, Ordering::Relaxed);
        self.token_amount.store(token_amount, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, scheduler_running: bool) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let cycles_total = load(&self.cycles_total);
        let cycles_failed = load(&self.cycles_failed);
        let cycles_skipped = load(&self.cycles_skipped);
        let cycle_dur_sum = load(&self.cycle_duration_us_sum);
        let cycle_dur_max = self.cycle_duration_us_max.swap(0, Ordering::Relaxed);
        let top_up_requests = load(&self.top_up_requests);
        let top_up_failures = load(&self.top_up_failures);
        let sweep_pool = load(&self.sweep_pool);
        let sweep_aggregator = load(&self.sweep_aggregator);
        let sweep_transfer = load(&self.sweep_transfer);
        let sweep_failures = load(&self.sweep_failures);
        let sweep_noop = load(&self.sweep_noop);
        let sweep_dry_run = load(&self.sweep_dry_run);
        let surplus_transfers = load(&self.surplus_transfers);
        let gate_allowed = load(&self.gate_allowed);
        let gate_denied = load(&self.gate_denied);
        let gate_fail_open = load(&self.gate_fail_open);
        let gate_emergency = load(&self.gate_emergency);
        let rpc_failovers = load(&self.rpc_failovers);
        let rpc_errors = load(&self.rpc_errors);
        let native_lamports = load(&self.native_lamports);
        let token_amount = load(&self.token_amount);
        let running = u8::from(scheduler_running);

        // Convert μs to seconds for Prometheus conventions
        let cycle_dur_sum_s = cycle_dur_sum as f64 / 1_000_000.0;
        let cycle_dur_max_s = cycle_dur_max as f64 / 1_000_000.0;

        format!(
            "\
# HELP relayer_maintenance_running Whether the maintenance scheduler is armed.\n\
# TYPE relayer_maintenance_running gauge\n\
relayer_maintenance_running {running}\n\
# HELP relayer_cycles_total Maintenance cycles started.\n\
# TYPE relayer_cycles_total counter\n\
relayer_cycles_total {cycles_total}\n\
# HELP relayer_cycles_failed_total Maintenance cycles that errored.\n\
# TYPE relayer_cycles_failed_total counter\n\
relayer_cycles_failed_total {cycles_failed}\n\
# HELP relayer_cycles_skipped_total Ticks or triggers skipped because a cycle was in flight.\n\
# TYPE relayer_cycles_skipped_total counter\n\
relayer_cycles_skipped_total {cycles_skipped}\n\
# HELP relayer_cycle_duration_seconds_sum Total cycle time (seconds).\n\
# TYPE relayer_cycle_duration_seconds_sum counter\n\
relayer_cycle_duration_seconds_sum {cycle_dur_sum_s:.6}\n\
# HELP relayer_cycle_duration_seconds_max Max cycle time since last scrape (seconds).\n\
# TYPE relayer_cycle_duration_seconds_max gauge\n\
relayer_cycle_duration_seconds_max {cycle_dur_max_s:.6}\n\
# HELP relayer_top_up_requests_total Faucet top-ups requested.\n\
# TYPE relayer_top_up_requests_total counter\n\
relayer_top_up_requests_total {top_up_requests}\n\
# HELP relayer_top_up_failures_total Top-ups that errored or fell short of 90% of target.\n\
# TYPE relayer_top_up_failures_total counter\n\
relayer_top_up_failures_total {top_up_failures}\n\
# HELP relayer_sweeps_total Executed sweeps by strategy.\n\
# TYPE relayer_sweeps_total counter\n\
relayer_sweeps_total{{strategy=\"pool_swap\"}} {sweep_pool}\n\
relayer_sweeps_total{{strategy=\"aggregator_swap\"}} {sweep_aggregator}\n\
relayer_sweeps_total{{strategy=\"direct_transfer\"}} {sweep_transfer}\n\
# HELP relayer_sweep_failures_total Sweeps whose execution failed.\n\
# TYPE relayer_sweep_failures_total counter\n\
relayer_sweep_failures_total {sweep_failures}\n\
# HELP relayer_sweep_noop_total Sweep checks below threshold.\n\
# TYPE relayer_sweep_noop_total counter\n\
relayer_sweep_noop_total {sweep_noop}\n\
# HELP relayer_sweep_dry_run_total Sweeps decided but not executed (dry run).\n\
# TYPE relayer_sweep_dry_run_total counter\n\
relayer_sweep_dry_run_total {sweep_dry_run}\n\
# HELP relayer_surplus_transfers_total Native surplus transfers to the operator.\n\
# TYPE relayer_surplus_transfers_total counter\n\
relayer_surplus_transfers_total {surplus_transfers}\n\
# HELP relayer_gate_allowed_total Admission checks that allowed the request.\n\
# TYPE relayer_gate_allowed_total counter\n\
relayer_gate_allowed_total {gate_allowed}\n\
# HELP relayer_gate_denied_total Admission checks that denied the request.\n\
# TYPE relayer_gate_denied_total counter\n\
relayer_gate_denied_total {gate_denied}\n\
# HELP relayer_gate_fail_open_total Admissions allowed because the balance read failed.\n\
# TYPE relayer_gate_fail_open_total counter\n\
relayer_gate_fail_open_total {gate_fail_open}\n\
# HELP relayer_gate_emergency_total Emergency replenishments attempted by the gate.\n\
# TYPE relayer_gate_emergency_total counter\n\
relayer_gate_emergency_total {gate_emergency}\n\
# HELP relayer_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE relayer_rpc_failovers_total counter\n\
relayer_rpc_failovers_total {rpc_failovers}\n\
# HELP relayer_rpc_errors_total RPC errors.\n\
# TYPE relayer_rpc_errors_total counter\n\
relayer_rpc_errors_total {rpc_errors}\n\
# HELP relayer_wallet_native_lamports Last observed native balance.\n\
# TYPE relayer_wallet_native_lamports gauge\n\
relayer_wallet_native_lamports {native_lamports}\n\
# HELP relayer_wallet_token_amount Last observed fee-token balance (base units).\n\
# TYPE relayer_wallet_token_amount gauge\n\
relayer_wallet_token_amount {token_amount}\n"
        )
    }
}
