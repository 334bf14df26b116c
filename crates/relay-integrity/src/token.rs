//! Detached-signature message tokens.
//!
//! A token authenticates a `(key, message)` pair handed back to a client in
//! one step of a multi-step flow (e.g. a swap quote) so a later step can
//! prove the relayer issued it. Signed buffer layout, no delimiters:
//!
//! `DOMAIN_TAG || key (utf-8) || message bytes`
//!
//! The layout and tag are wire format: changing either invalidates every
//! token already issued. Tokens carry no expiry or nonce; replay protection
//! comes from the uniqueness of `message`.

use ed25519_dalek::{Keypair, PublicKey, Signer, Verifier};

use crate::{decode_signature, IntegrityError};

/// Domain-separation tag prefixed to every signed buffer.
pub const DOMAIN_TAG: &[u8] = b"octane-message-token";

fn buffer_to_sign(key: &str, message: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(DOMAIN_TAG.len() + key.len() + message.len());
    buffer.extend_from_slice(DOMAIN_TAG);
    buffer.extend_from_slice(key.as_bytes());
    buffer.extend_from_slice(message);
    buffer
}

/// Issuer/verifier for message tokens. Stateless.
pub struct MessageToken;

impl MessageToken {
    /// Sign `(key, message)` and return the base58 signature string.
    pub fn issue(key: &str, message: &[u8], keypair: &Keypair) -> String {
        let signature = keypair.sign(&buffer_to_sign(key, message));
        bs58::encode(signature.to_bytes()).into_string()
    }

    /// `true` iff `token` is a valid signature over `(key, message)` by `expected`.
    pub fn verify(key: &str, message: &[u8], token: &str, expected: &PublicKey) -> bool {
        Self::ensure_valid(key, message, token, expected).is_ok()
    }

    /// Like [`MessageToken::verify`] but reports why the token was rejected.
    /// An empty token is rejected before any decoding or signature math.
    pub fn ensure_valid(
        key: &str,
        message: &[u8],
        token: &str,
        expected: &PublicKey,
    ) -> Result<(), IntegrityError> {
        if token.is_empty() {
            return Err(IntegrityError::TokenMissing);
        }
        let signature = decode_signature(token).map_err(|_| IntegrityError::TokenInvalid)?;
        expected
            .verify(&buffer_to_sign(key, message), &signature)
            .map_err(|_| IntegrityError::TokenInvalid)
    }
}
