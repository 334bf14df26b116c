//! Direct token transfer to the operator. Always available.

use async_trait::async_trait;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use tracing::info;

use super::{SweepContext, SweepStrategy};

pub const NAME: &str = "direct_transfer";

pub struct DirectTransfer {
    ctx: SweepContext,
    operator: Pubkey,
}

impl DirectTransfer {
    pub fn new(ctx: SweepContext, operator: Pubkey) -> Self {
        Self { ctx, operator }
    }
}

/// Optional operator ATA creation followed by a checked transfer of `amount`.
pub fn transfer_instructions(
    wallet: &Pubkey,
    operator: &Pubkey,
    mint: &Pubkey,
    decimals: u8,
    amount: u64,
    operator_account_exists: bool,
) -> Result<Vec<Instruction>, crate::Error> {
    let source = get_associated_token_address(wallet, mint);
    let destination = get_associated_token_address(operator, mint);
    let mut instructions = Vec::with_capacity(2);
    if !operator_account_exists {
        instructions.push(create_associated_token_account_idempotent(
            wallet,
            operator,
            mint,
            &spl_token::id(),
        ));
    }
    instructions.push(
        spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source,
            mint,
            &destination,
            wallet,
            &[],
            amount,
            decimals,
        )
        .map_err(|e| crate::Error::Sweep(format!("transfer instruction: {e}")))?,
    );
    Ok(instructions)
}

#[async_trait]
impl SweepStrategy for DirectTransfer {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn probe(&self, _canary: u64) -> Result<(), crate::Error> {
        Ok(())
    }

    async fn execute(&self, amount: u64) -> Result<String, crate::Error> {
        let wallet = self.ctx.wallet.pubkey();
        let destination = get_associated_token_address(&self.operator, &self.ctx.token_mint);
        let exists = self.ctx.ledger.account_exists(&destination).await?;
        let instructions = transfer_instructions(
            &wallet,
            &self.operator,
            &self.ctx.token_mint,
            self.ctx.token_decimals,
            amount,
            exists,
        )?;
        let blockhash = self.ctx.ledger.latest_blockhash().await?;
        let tx = self.ctx.wallet.sign_instructions(&instructions, blockhash)?;
        let signature = self.ctx.ledger.submit(&tx).await?;
        info!(
            operator = %self.operator,
            amount,
            created_account = !exists,
            %signature,
            "Fee tokens transferred to operator"
        );
        Ok(signature.to_string())
    }
}
