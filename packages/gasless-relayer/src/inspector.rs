//! Balance inspection for the custodial wallet.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use std::sync::Arc;

use crate::ledger::{now_ms, Ledger};
use crate::metrics::METRICS;

/// One observation of the wallet. Re-read every time; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WalletResourceState {
    pub native_lamports: u64,
    /// Fee-token base units; zero when the token account does not exist.
    pub token_amount: u64,
    pub observed_at_ms: u64,
}

#[derive(Clone)]
pub struct BalanceInspector {
    ledger: Arc<dyn Ledger>,
    wallet: Pubkey,
    token_account: Pubkey,
}

impl BalanceInspector {
    pub fn new(ledger: Arc<dyn Ledger>, wallet: Pubkey, token_mint: &Pubkey) -> Self {
        Self {
            ledger,
            wallet,
            token_account: get_associated_token_address(&wallet, token_mint),
        }
    }

    pub fn wallet(&self) -> Pubkey {
        self.wallet
    }

    pub fn token_account(&self) -> Pubkey {
        self.token_account
    }

    pub async fn native_balance(&self) -> Result<u64, crate::Error> {
        self.ledger.native_balance(&self.wallet).await
    }

    pub async fn token_balance(&self) -> Result<u64, crate::Error> {
        Ok(self
            .ledger
            .token_account_amount(&self.token_account)
            .await?
            .unwrap_or(0))
    }

    /// Errors are transient ledger failures; callers retry on their own schedule.
    pub async fn inspect(&self) -> Result<WalletResourceState, crate::Error> {
        let native_lamports = self.native_balance().await?;
        let token_amount = self.token_balance().await?;
        METRICS.observe_balances(native_lamports, token_amount);
        Ok(WalletResourceState {
            native_lamports,
            token_amount,
            observed_at_ms: now_ms(),
        })
    }
}
