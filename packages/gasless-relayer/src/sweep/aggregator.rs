//! Aggregator-routed swap of fee tokens into wrapped SOL.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode_wire_transaction, SweepContext, SweepStrategy};

pub const NAME: &str = "aggregator_swap";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    quote_response: &'a Value,
    user_public_key: String,
    wrap_and_unwrap_sol: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    /// Base64 wire transaction.
    swap_transaction: String,
}

pub struct AggregatorSwap {
    ctx: SweepContext,
    base_url: String,
}

impl AggregatorSwap {
    pub fn new(ctx: SweepContext, aggregator_url: &str) -> Self {
        Self {
            ctx,
            base_url: aggregator_url.trim_end_matches('/').to_string(),
        }
    }

    async fn quote(&self, amount: u64) -> Result<Value, crate::Error> {
        let response = self
            .ctx
            .http
            .get(format!("{}/quote", self.base_url))
            .query(&[
                ("inputMint", self.ctx.token_mint.to_string()),
                ("outputMint", spl_token::native_mint::id().to_string()),
                ("amount", amount.to_string()),
                ("slippageBps", self.ctx.slippage_bps.to_string()),
            ])
            .send()
            .await
            .map_err(|e| crate::Error::Quote(format!("aggregator unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::Error::Quote(format!("aggregator quote HTTP {status}")));
        }
        let quote: Value = response
            .json()
            .await
            .map_err(|e| crate::Error::Quote(format!("aggregator quote parse error: {e}")))?;
        check_quote(quote)
    }
}

/// A quote is usable iff it carries no `error` field.
fn check_quote(quote: Value) -> Result<Value, crate::Error> {
    match quote.get("error") {
        Some(err) if !err.is_null() => Err(crate::Error::Quote(format!(
            "aggregator quote error: {err}"
        ))),
        _ => Ok(quote),
    }
}

#[async_trait]
impl SweepStrategy for AggregatorSwap {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn probe(&self, canary: u64) -> Result<(), crate::Error> {
        self.quote(canary).await.map(|_| ())
    }

    async fn execute(&self, amount: u64) -> Result<String, crate::Error> {
        let quote = self.quote(amount).await?;
        let body = SwapRequest {
            quote_response: &quote,
            user_public_key: self.ctx.wallet.pubkey().to_string(),
            wrap_and_unwrap_sol: true,
        };
        let response = self
            .ctx
            .http
            .post(format!("{}/swap", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::Error::Sweep(format!("aggregator swap unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(crate::Error::Sweep(format!("aggregator swap HTTP {status}")));
        }
        let swap: SwapResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Sweep(format!("aggregator swap parse error: {e}")))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&swap.swap_transaction)
            .map_err(|e| crate::Error::Sweep(format!("swap transaction is not base64: {e}")))?;
        let tx = decode_wire_transaction(&bytes)?;
        self.ctx
            .sign_and_submit(tx)
            .await
            .map_err(|e| crate::Error::Sweep(format!("aggregator swap: {e}")))
    }
}
