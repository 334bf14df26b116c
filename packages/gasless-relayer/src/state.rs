//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::admission::AdmissionGate;
use crate::config::Config;
use crate::inspector::BalanceInspector;
use crate::ledger::{Faucet, Ledger, RpcLedger};
use crate::maintenance::{FundManager, MaintenanceScheduler};
use crate::replenish::{ReplenishmentPolicy, ReplenishmentTarget};
use crate::surplus::SurplusDistributor;
use crate::sweep::{self, SweepContext, SweepSelector, SweepStrategy};
use crate::wallet::CustodialWallet;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn Ledger>,
    pub wallet: Arc<CustodialWallet>,
    pub scheduler: MaintenanceScheduler,
    pub gate: AdmissionGate,
    pub start_time: Instant,
}

impl AppState {
    /// Validate configuration, load the custodial key and wire the RPC ledger.
    pub fn new(config: Config) -> Result<Self, crate::Error> {
        config.validate()?;
        let wallet = Arc::new(CustodialWallet::load(&config)?);
        let rpc = Arc::new(RpcLedger::new(&config.rpc_url, &config.fallback_rpc_url));
        let ctx = SweepContext {
            wallet: Arc::clone(&wallet),
            ledger: rpc.clone(),
            http: sweep::http_client()?,
            token_mint: config.token_mint()?,
            token_decimals: config.token_decimals,
            slippage_bps: config.sweep.slippage_bps,
        };
        let strategies = sweep::default_strategies(&config, ctx)?;
        Self::from_parts(config, rpc.clone(), rpc, wallet, strategies)
    }

    /// Assemble from explicit collaborators.
    pub fn from_parts(
        config: Config,
        ledger: Arc<dyn Ledger>,
        faucet: Arc<dyn Faucet>,
        wallet: Arc<CustodialWallet>,
        strategies: Vec<Arc<dyn SweepStrategy>>,
    ) -> Result<Self, crate::Error> {
        let m = &config.maintenance;
        let inspector =
            BalanceInspector::new(Arc::clone(&ledger), wallet.pubkey(), &config.token_mint()?);
        let token_account = inspector.token_account();
        let replenisher = ReplenishmentPolicy::new(inspector.clone(), faucet, m);
        let target =
            ReplenishmentTarget::new(m.floor_lamports, m.target_lamports, m.max_top_up_lamports)?;
        let sweeper = SweepSelector::new(strategies, &config.sweep, config.dry_run);
        let surplus = if config.surplus.enabled {
            Some(SurplusDistributor::new(
                Arc::clone(&ledger),
                Arc::clone(&wallet),
                config.operator()?,
                &config.surplus,
                config.dry_run,
            ))
        } else {
            None
        };

        let gate = AdmissionGate::new(
            inspector.clone(),
            replenisher.clone(),
            &config.admission,
            m.max_top_up_lamports,
        )?;
        let manager = FundManager::new(
            inspector,
            replenisher,
            target,
            sweeper,
            config.sweep.reserve_amount,
            surplus,
        );
        let scheduler = MaintenanceScheduler::new(manager, m.period());

        info!(
            wallet = %wallet.pubkey(),
            %token_account,
            dry_run = config.dry_run,
            "Fund manager assembled"
        );

        Ok(Self {
            config,
            ledger,
            wallet,
            scheduler,
            gate,
            start_time: Instant::now(),
        })
    }
}
