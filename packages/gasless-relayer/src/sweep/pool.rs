//! Liquidity-pool swap through the pool transaction builder service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{decode_wire_transaction, SweepContext, SweepStrategy};

pub const NAME: &str = "pool_swap";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildSwapRequest {
    user: String,
    source_mint: String,
    amount: u64,
    /// Fraction, e.g. 0.01 for 1%.
    slipping_tolerance: f64,
}

#[derive(Deserialize)]
struct BuildSwapResponse {
    status: String,
    /// Base58 wire transaction.
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub struct PoolSwap {
    ctx: SweepContext,
    url: String,
}

impl PoolSwap {
    pub fn new(ctx: SweepContext, service_url: &str) -> Self {
        Self {
            ctx,
            url: format!(
                "{}/api/buildWhirlpoolsSwap",
                service_url.trim_end_matches('/')
            ),
        }
    }

    /// Ask the builder for a swap of `amount` fee tokens into the native currency.
    async fn build(&self, amount: u64) -> Result<String, crate::Error> {
        let body = BuildSwapRequest {
            user: self.ctx.wallet.pubkey().to_string(),
            source_mint: self.ctx.token_mint.to_string(),
            amount,
            slipping_tolerance: f64::from(self.ctx.slippage_bps) / 10_000.0,
        };
        let response = self
            .ctx
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::Error::Quote(format!("pool builder unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::Error::Quote(format!("pool builder HTTP {status}")));
        }
        let parsed: BuildSwapResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Quote(format!("pool builder parse error: {e}")))?;
        transaction_from(parsed)
    }
}

fn transaction_from(response: BuildSwapResponse) -> Result<String, crate::Error> {
    if response.status != "ok" {
        return Err(crate::Error::Quote(format!(
            "pool builder status '{}': {}",
            response.status,
            response.message.unwrap_or_default()
        )));
    }
    response
        .transaction
        .ok_or_else(|| crate::Error::Quote("pool builder returned no transaction".into()))
}

#[async_trait]
impl SweepStrategy for PoolSwap {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn probe(&self, canary: u64) -> Result<(), crate::Error> {
        self.build(canary).await.map(|_| ())
    }

    async fn execute(&self, amount: u64) -> Result<String, crate::Error> {
        let encoded = self.build(amount).await?;
        let bytes = bs58::decode(&encoded)
            .into_vec()
            .map_err(|e| crate::Error::Quote(format!("pool transaction is not base58: {e}")))?;
        let tx = decode_wire_transaction(&bytes)?;
        debug!(signatures = tx.signatures.len(), "Pool swap transaction decoded");
        self.ctx
            .sign_and_submit(tx)
            .await
            .map_err(|e| crate::Error::Sweep(format!("pool swap: {e}")))
    }
}
