//! Integrity primitives for the gasless relayer.
//! No ledger SDK dependency: callers convert their own instruction and
//! message types into the plain descriptors used here.

mod crypto;
mod error;
mod instruction;
mod token;

pub use crypto::{decode_public_key, decode_signature, ed25519_public_key_bytes};
pub use error::IntegrityError;
pub use instruction::{
    ensure_instructions_equal, instructions_equal, AccountDescriptor, InstructionDescriptor,
};
pub use token::{MessageToken, DOMAIN_TAG};
