//! Native surplus distribution: lamports above a ceiling go to the operator.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_system_interface::instruction as system_instruction;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SurplusConfig;
use crate::ledger::Ledger;
use crate::metrics::METRICS;
use crate::wallet::CustodialWallet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SurplusOutcome {
    Transferred { amount: u64, signature: String },
    DryRun { amount: u64 },
    Failed { amount: u64, error: String },
}

pub struct SurplusDistributor {
    ledger: Arc<dyn Ledger>,
    wallet: Arc<CustodialWallet>,
    operator: Pubkey,
    ceiling: u64,
    min_transfer: u64,
    dry_run: bool,
}

impl SurplusDistributor {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        wallet: Arc<CustodialWallet>,
        operator: Pubkey,
        config: &SurplusConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            ledger,
            wallet,
            operator,
            ceiling: config.ceiling_lamports,
            min_transfer: config.min_transfer_lamports,
            dry_run,
        }
    }

    /// Lamports above the ceiling, if worth a transfer.
    pub fn surplus(&self, native_lamports: u64) -> Option<u64> {
        let surplus = native_lamports.saturating_sub(self.ceiling);
        (surplus > self.min_transfer).then_some(surplus)
    }

    /// At most one transfer. `None` when there is nothing to distribute.
    pub async fn distribute(&self, native_lamports: u64) -> Option<SurplusOutcome> {
        let amount = self.surplus(native_lamports)?;
        if self.dry_run {
            info!(amount, operator = %self.operator, "Dry run: surplus not transferred");
            return Some(SurplusOutcome::DryRun { amount });
        }
        Some(match self.transfer(amount).await {
            Ok(signature) => {
                METRICS.surplus_transfers.fetch_add(1, Ordering::Relaxed);
                info!(amount, operator = %self.operator, %signature, "Surplus transferred");
                SurplusOutcome::Transferred { amount, signature }
            }
            Err(e) => {
                warn!(amount, error = %e, "Surplus transfer failed");
                SurplusOutcome::Failed {
                    amount,
                    error: e.to_string(),
                }
            }
        })
    }

    async fn transfer(&self, amount: u64) -> Result<String, crate::Error> {
        let ix = system_instruction::transfer(&self.wallet.pubkey(), &self.operator, amount);
        let blockhash = self.ledger.latest_blockhash().await?;
        let tx = self.wallet.sign_instructions(&[ix], blockhash)?;
        Ok(self.ledger.submit(&tx).await?.to_string())
    }
}
