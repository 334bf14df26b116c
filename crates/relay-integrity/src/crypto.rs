//! Ed25519 key and signature decoding helpers.

use ed25519_dalek::{PublicKey, Signature};

use crate::IntegrityError;

/// Extract 32 raw ed25519 public key bytes.
pub fn ed25519_public_key_bytes(pk_raw: &[u8]) -> Result<[u8; 32], IntegrityError> {
    pk_raw
        .try_into()
        .map_err(|_| IntegrityError::InvalidInput("Invalid ed25519 public key bytes".into()))
}

/// Decode a base58 address into a verification key.
pub fn decode_public_key(encoded: &str) -> Result<PublicKey, IntegrityError> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| IntegrityError::InvalidInput(format!("Invalid base58 public key: {e}")))?;
    let bytes = ed25519_public_key_bytes(&raw)?;
    PublicKey::from_bytes(&bytes)
        .map_err(|e| IntegrityError::InvalidInput(format!("Invalid ed25519 public key: {e}")))
}

/// Decode a base58 detached signature.
pub fn decode_signature(encoded: &str) -> Result<Signature, IntegrityError> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| IntegrityError::InvalidInput(format!("Invalid base58 signature: {e}")))?;
    Signature::try_from(raw.as_slice())
        .map_err(|_| IntegrityError::InvalidInput("Invalid ed25519 signature bytes".into()))
}
