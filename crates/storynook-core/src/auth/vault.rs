//! Encrypted at-rest storage for the session.
//!
//! The persisted session carries a live bearer token, so it is sealed with
//! XChaCha20-Poly1305 under a key derived (Argon2id) from a device secret
//! held in the OS keychain. Opening fails closed: a missing, tampered or
//! re-keyed vault reads as "no session" and the next save rewrites it.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::credentials::CredentialStore;
use super::session::SessionData;

/// Vault file name inside the data directory
const VAULT_FILE: &str = "session.vault";

/// Argon2 salt length in bytes
const SALT_BYTES: usize = 16;

/// XChaCha20 nonce length in bytes
const NONCE_BYTES: usize = 24;

/// Derived cipher key length in bytes
const KEY_BYTES: usize = 32;

/// On-disk format: every binary field hex-encoded inside a JSON envelope.
#[derive(Debug, Serialize, Deserialize)]
struct VaultEnvelope {
    salt: String,
    nonce: String,
    sealed: String,
}

pub struct SecretVault {
    path: PathBuf,
    secret: Vec<u8>,
}

impl SecretVault {
    /// Vault keyed by the OS-keychain device secret.
    pub fn open_default(data_dir: &Path) -> Result<Self> {
        let secret = CredentialStore::device_secret()?;
        Ok(Self::with_secret(data_dir, secret))
    }

    /// Vault keyed by an explicit secret. Tests use this to stay off the
    /// keychain.
    pub fn with_secret(data_dir: &Path, secret: Vec<u8>) -> Self {
        Self {
            path: data_dir.join(VAULT_FILE),
            secret,
        }
    }

    /// Seal and persist the session, replacing any previous vault. Salt
    /// and nonce are fresh per save.
    pub fn save(&self, session: &SessionData) -> Result<()> {
        let plaintext = serde_json::to_vec(session).context("Failed to encode session")?;

        let mut salt = [0u8; SALT_BYTES];
        rand::thread_rng().fill_bytes(&mut salt);
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| anyhow!("Failed to seal session"))?;

        let envelope = VaultEnvelope {
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            sealed: hex::encode(sealed),
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let contents = serde_json::to_string_pretty(&envelope)?;
        std::fs::write(&self.path, contents).context("Failed to write session vault")?;
        debug!(path = %self.path.display(), "session vault written");
        Ok(())
    }

    /// Load the sealed session. `Ok(None)` covers both a missing vault and
    /// one that fails to open (tampered file, rotated device secret); the
    /// caller falls back to a fresh sign-in either way.
    pub fn load(&self) -> Result<Option<SessionData>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session vault")?;
        let envelope: VaultEnvelope = match serde_json::from_str(&contents) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "session vault is malformed, ignoring it");
                return Ok(None);
            }
        };
        match self.unseal(&envelope) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                warn!(error = %err, "session vault could not be opened, ignoring it");
                Ok(None)
            }
        }
    }

    /// Delete the vault file. Idempotent.
    pub fn wipe(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session vault")?;
        }
        Ok(())
    }

    fn unseal(&self, envelope: &VaultEnvelope) -> Result<SessionData> {
        let salt = hex::decode(&envelope.salt).context("Vault salt is not valid hex")?;
        let nonce = hex::decode(&envelope.nonce).context("Vault nonce is not valid hex")?;
        let sealed = hex::decode(&envelope.sealed).context("Vault payload is not valid hex")?;
        if nonce.len() != NONCE_BYTES {
            return Err(anyhow!("Vault nonce has the wrong length"));
        }

        let key = self.derive_key(&salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let plaintext = cipher
            .decrypt(XNonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| anyhow!("Vault authentication failed"))?;
        serde_json::from_slice(&plaintext).context("Failed to decode sealed session")
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_BYTES]> {
        let mut key = [0u8; KEY_BYTES];
        Argon2::default()
            .hash_password_into(&self.secret, salt, &mut key)
            .map_err(|err| anyhow!("Key derivation failed: {err}"))?;
        Ok(key)
    }
}
