//! Encrypted custodial key persistence (AES-256-GCM).

use solana_sdk::signature::{Keypair, Signer};
use std::path::PathBuf;
use tracing::info;

/// Single-keypair store, always encrypted at rest.
pub struct KeyStore {
    path: PathBuf,
    encryption_key: [u8; 32],
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredKeypair {
    public_key: String,
    /// Base58 of the 64-byte secret||public keypair.
    secret_key: String,
}

impl KeyStore {
    pub fn new(path: PathBuf, key_b64: &str) -> Result<Self, crate::Error> {
        let key_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, key_b64)
            .map_err(|e| crate::Error::Config(format!("Invalid encryption key base64: {e}")))?;

        let encryption_key: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| {
            crate::Error::Config(format!(
                "Encryption key must be 32 bytes, got {}",
                key_bytes.len()
            ))
        })?;

        Ok(Self {
            path,
            encryption_key,
        })
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, keypair: &Keypair) -> Result<(), crate::Error> {
        let stored = StoredKeypair {
            public_key: keypair.pubkey().to_string(),
            secret_key: keypair.to_base58_string(),
        };

        let json = serde_json::to_vec(&stored)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize keypair: {e}")))?;
        let data = encrypt_aes256gcm(&self.encryption_key, &json)?;

        // Atomic write: tmp + rename
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = tmp.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                crate::Error::Config(format!("Failed to create key store directory: {e}"))
            })?;
        }
        std::fs::write(&tmp, &data)
            .map_err(|e| crate::Error::Config(format!("Failed to write key store: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| crate::Error::Config(format!("Failed to rename key store: {e}")))?;

        info!(path = %self.path.display(), pubkey = %keypair.pubkey(), "Key store saved");
        Ok(())
    }

    /// `Ok(None)` when no store exists yet.
    pub fn load(&self) -> Result<Option<Keypair>, crate::Error> {
        if !self.exists() {
            info!(path = %self.path.display(), "No key store found");
            return Ok(None);
        }

        let data = std::fs::read(&self.path)
            .map_err(|e| crate::Error::Config(format!("Failed to read key store: {e}")))?;
        let json = decrypt_aes256gcm(&self.encryption_key, &data)?;
        let stored: StoredKeypair = serde_json::from_slice(&json)
            .map_err(|e| crate::Error::Config(format!("Failed to parse key store: {e}")))?;

        let keypair = crate::wallet::keypair_from_base58(&stored.secret_key)?;
        if keypair.pubkey().to_string() != stored.public_key {
            return Err(crate::Error::Config(
                "Key store public key does not match its secret key".into(),
            ));
        }

        info!(path = %self.path.display(), pubkey = %keypair.pubkey(), "Key store loaded");
        Ok(Some(keypair))
    }
}

fn encrypt_aes256gcm(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, crate::Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use rand::RngCore;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| crate::Error::Config(format!("AES init failed: {e}")))?;

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| crate::Error::Config(format!("Encryption failed: {e}")))?;

    // nonce || ciphertext
    let mut result = Vec::with_capacity(12 + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn decrypt_aes256gcm(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, crate::Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};

    if data.len() < 12 {
        return Err(crate::Error::Config(
            "Encrypted data too short (missing nonce)".into(),
        ));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| crate::Error::Config(format!("AES init failed: {e}")))?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| crate::Error::Config(format!("Decryption failed (wrong key?): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn key_b64(byte: u8) -> String {
        base64::engine::general_purpose::STANDARD.encode([byte; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; 32];
        let plaintext = b"custodial key material";
        let encrypted = encrypt_aes256gcm(&key, plaintext).unwrap();
        assert_ne!(&encrypted[12..], plaintext.as_slice());
        let decrypted = decrypt_aes256gcm(&key, &encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let encrypted = encrypt_aes256gcm(&[42u8; 32], b"secret").unwrap();
        assert!(decrypt_aes256gcm(&[99u8; 32], &encrypted).is_err());
    }

    #[test]
    fn test_key_must_be_32_bytes() {
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 16]);
        assert!(KeyStore::new(PathBuf::from("unused"), &short).is_err());
        assert!(KeyStore::new(PathBuf::from("unused"), "%%%").is_err());
    }

    #[test]
    fn test_store_roundtrip() {
        let path = std::env::temp_dir().join(format!("relayer_keystore_{}", std::process::id()));
        let store = KeyStore::new(path.clone(), &key_b64(7)).unwrap();
        let keypair = Keypair::new();
        store.save(&keypair).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        let other = KeyStore::new(path.clone(), &key_b64(8)).unwrap();
        assert!(other.load().is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_store_is_none() {
        let path = std::env::temp_dir().join("relayer_keystore_absent_do_not_create");
        let store = KeyStore::new(path, &key_b64(1)).unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
