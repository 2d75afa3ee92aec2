//! OS-keychain storage for the device secret that keys the session vault.

use anyhow::{Context, Result};
use keyring::Entry;
use rand::RngCore;

const SERVICE_NAME: &str = "storynook";

/// Keychain entry name for the vault key material.
const DEVICE_SECRET_USER: &str = "device-secret";

/// Device secret length in bytes.
const DEVICE_SECRET_BYTES: usize = 32;

pub struct CredentialStore;

impl CredentialStore {
    /// Fetch the device secret, minting and storing a fresh one on first
    /// use. The secret never leaves this machine; it only keys the local
    /// session vault.
    pub fn device_secret() -> Result<Vec<u8>> {
        let entry = Entry::new(SERVICE_NAME, DEVICE_SECRET_USER)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(encoded) => hex::decode(&encoded).context("Stored device secret is not valid hex"),
            Err(keyring::Error::NoEntry) => {
                let mut secret = vec![0u8; DEVICE_SECRET_BYTES];
                rand::thread_rng().fill_bytes(&mut secret);
                entry
                    .set_password(&hex::encode(&secret))
                    .context("Failed to store device secret in keychain")?;
                Ok(secret)
            }
            Err(err) => Err(err).context("Failed to read device secret from keychain"),
        }
    }

    /// Remove the device secret. Any existing vault becomes unreadable;
    /// the next session save mints a fresh secret.
    pub fn forget_device_secret() -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, DEVICE_SECRET_USER)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err).context("Failed to delete device secret from keychain"),
        }
    }
}
