//! Structural equality for on-chain instructions.
//!
//! Used to assert that the instruction about to be submitted (typically the
//! fee-deduction transfer) is exactly the one that was authorized. Account
//! order and both account flags are significant.

use crate::IntegrityError;

/// One account reference of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDescriptor {
    pub address: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Ledger-agnostic view of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDescriptor {
    pub program_id: [u8; 32],
    pub accounts: Vec<AccountDescriptor>,
    pub data: Vec<u8>,
}

/// `true` iff both descriptors are structurally identical.
pub fn instructions_equal(a: &InstructionDescriptor, b: &InstructionDescriptor) -> bool {
    first_mismatch(a, b).is_none()
}

/// Fails with the first difference found.
pub fn ensure_instructions_equal(
    expected: &InstructionDescriptor,
    actual: &InstructionDescriptor,
) -> Result<(), IntegrityError> {
    match first_mismatch(expected, actual) {
        None => Ok(()),
        Some(what) => Err(IntegrityError::InstructionMismatch(what)),
    }
}

fn first_mismatch(a: &InstructionDescriptor, b: &InstructionDescriptor) -> Option<String> {
    if a.data != b.data {
        return Some("data".into());
    }
    if a.program_id != b.program_id {
        return Some("program id".into());
    }
    if a.accounts.len() != b.accounts.len() {
        return Some(format!(
            "account count {} != {}",
            a.accounts.len(),
            b.accounts.len()
        ));
    }
    for (i, (x, y)) in a.accounts.iter().zip(&b.accounts).enumerate() {
        if x.address != y.address {
            return Some(format!("account {i} address"));
        }
        if x.is_writable != y.is_writable {
            return Some(format!("account {i} writable flag"));
        }
        if x.is_signer != y.is_signer {
            return Some(format!("account {i} signer flag"));
        }
    }
    None
}
