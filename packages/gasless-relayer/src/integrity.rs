//! Solana bindings for the `relay-integrity` primitives.

use relay_integrity::{
    ensure_instructions_equal, AccountDescriptor, InstructionDescriptor, MessageToken,
};
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;

use crate::wallet::CustodialWallet;

pub fn descriptor(ix: &Instruction) -> InstructionDescriptor {
    InstructionDescriptor {
        program_id: ix.program_id.to_bytes(),
        accounts: ix
            .accounts
            .iter()
            .map(|meta| AccountDescriptor {
                address: meta.pubkey.to_bytes(),
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
            })
            .collect(),
        data: ix.data.clone(),
    }
}

/// Reject `actual` unless it is exactly the authorized `expected` instruction.
pub fn ensure_same_instruction(
    expected: &Instruction,
    actual: &Instruction,
) -> Result<(), crate::Error> {
    ensure_instructions_equal(&descriptor(expected), &descriptor(actual))?;
    Ok(())
}

/// Token binding `key` to a transaction message, signed by the custodial wallet.
pub fn issue_message_token(
    wallet: &CustodialWallet,
    key: &str,
    message: &Message,
) -> Result<String, crate::Error> {
    let keypair = wallet.token_keypair()?;
    Ok(MessageToken::issue(key, &message.serialize(), &keypair))
}

pub fn verify_message_token(
    key: &str,
    message: &Message,
    token: &str,
    signer: &Pubkey,
) -> Result<(), crate::Error> {
    let public_key = ed25519_dalek::PublicKey::from_bytes(signer.as_ref())
        .map_err(|e| crate::Error::Integrity(format!("invalid signer key: {e}")))?;
    MessageToken::ensure_valid(key, &message.serialize(), token, &public_key)?;
    Ok(())
}
