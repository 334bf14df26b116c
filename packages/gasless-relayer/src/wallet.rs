//! Custodial wallet: the service keypair that pays network fees.

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use tracing::info;

use crate::config::Config;
use crate::key_store::KeyStore;

/// Environment variable holding the base64 key-store encryption key.
pub const KEYSTORE_KEY_ENV: &str = "RELAYER_KEYSTORE_KEY";

pub struct CustodialWallet {
    keypair: Keypair,
}

impl CustodialWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load the keypair from the first configured source: inline secret,
    /// keypair file, then encrypted key store. No source is a startup error.
    pub fn load(config: &Config) -> Result<Self, crate::Error> {
        let keystore_key = std::env::var(KEYSTORE_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty());
        Self::load_with(config, keystore_key.as_deref())
    }

    /// A key read from a plain source is sealed into the key store when one
    /// is configured and does not exist yet, so later boots can drop it.
    fn load_with(config: &Config, keystore_key: Option<&str>) -> Result<Self, crate::Error> {
        let store = match (config.keystore_path.as_deref().filter(|s| !s.is_empty()), keystore_key) {
            (Some(path), Some(key)) => Some(KeyStore::new(path.into(), key)?),
            _ => None,
        };

        if let Some((keypair, source)) = plain_keypair(config)? {
            info!(pubkey = %keypair.pubkey(), source, "Custodial wallet loaded");
            if let Some(store) = store.as_ref().filter(|s| !s.exists()) {
                store.save(&keypair)?;
            }
            return Ok(Self::new(keypair));
        }

        if config.keystore_path.as_deref().is_some_and(|s| !s.is_empty()) {
            let store = store.ok_or_else(|| {
                crate::Error::Config(format!("{KEYSTORE_KEY_ENV} is required with keystore_path"))
            })?;
            if let Some(keypair) = store.load()? {
                info!(pubkey = %keypair.pubkey(), source = "keystore", "Custodial wallet loaded");
                return Ok(Self::new(keypair));
            }
        }

        Err(crate::Error::Config(
            "No custodial key configured (set secret_key, keypair_path or keystore_path)".into(),
        ))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Build a legacy transaction paid and signed by the wallet.
    pub fn sign_instructions(
        &self,
        instructions: &[Instruction],
        blockhash: Hash,
    ) -> Result<VersionedTransaction, crate::Error> {
        let message = Message::new(instructions, Some(&self.pubkey()));
        let mut tx = Transaction::new_unsigned(message);
        tx.try_sign(&[&self.keypair], blockhash)
            .map_err(|e| crate::Error::Sweep(format!("Failed to sign transaction: {e}")))?;
        Ok(VersionedTransaction::from(tx))
    }

    /// Sign a transaction built by an external swap service for this wallet.
    pub fn sign_prepared(
        &self,
        tx: VersionedTransaction,
    ) -> Result<VersionedTransaction, crate::Error> {
        VersionedTransaction::try_new(tx.message, &[&self.keypair])
            .map_err(|e| crate::Error::Sweep(format!("Failed to sign prepared transaction: {e}")))
    }

    /// The same key in `ed25519-dalek` form, for message tokens.
    pub(crate) fn token_keypair(&self) -> Result<ed25519_dalek::Keypair, crate::Error> {
        ed25519_dalek::Keypair::from_bytes(&self.keypair.to_bytes())
            .map_err(|e| crate::Error::Config(format!("Custodial key is not ed25519: {e}")))
    }
}

/// Keypair from `secret_key` or `keypair_path`, whichever is set first.
fn plain_keypair(config: &Config) -> Result<Option<(Keypair, &'static str)>, crate::Error> {
    if let Some(secret) = config.secret_key.as_deref().filter(|s| !s.is_empty()) {
        return Ok(Some((keypair_from_base58(secret)?, "secret_key")));
    }
    if let Some(path) = config.keypair_path.as_deref().filter(|s| !s.is_empty()) {
        let json = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read {path}: {e}")))?;
        return Ok(Some((parse_keypair_json(&json)?, "keypair_path")));
    }
    Ok(None)
}

/// Parse a base58-encoded 64-byte keypair.
pub fn keypair_from_base58(encoded: &str) -> Result<Keypair, crate::Error> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| crate::Error::Config(format!("Invalid base58 secret key: {e}")))?;
    keypair_from_bytes(&bytes)
}

/// Parse a Solana CLI keypair file (JSON array of 64 bytes).
pub fn parse_keypair_json(json: &str) -> Result<Keypair, crate::Error> {
    let bytes: Vec<u8> = serde_json::from_str(json)
        .map_err(|e| crate::Error::Config(format!("Invalid keypair JSON: {e}")))?;
    keypair_from_bytes(&bytes)
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, crate::Error> {
    if bytes.len() != 64 {
        return Err(crate::Error::Config(format!(
            "Keypair must be 64 bytes, got {}",
            bytes.len()
        )));
    }
    Keypair::try_from(bytes).map_err(|e| crate::Error::Config(format!("Invalid keypair: {e}")))
}
