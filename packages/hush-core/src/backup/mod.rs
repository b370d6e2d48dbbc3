//! # Backup Module
//!
//! Passphrase-sealed export of an identity's private keys.
//!
//! ## Sealing
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BACKUP SEALING                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  PrivateKeyBundle { agreement, encapsulation }                         │
//! │           │                                                             │
//! │           ▼  serde_json                                                │
//! │  bundle_json                                                           │
//! │           │                                                             │
//! │           │     passphrase ──► PBKDF2-HMAC-SHA256(salt, iterations)    │
//! │           │                              │                              │
//! │           ▼                              ▼                              │
//! │  AES-256-GCM(backup_key, nonce, bundle_json, aad = header)             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  SealedBackup { version, iterations, salt, nonce, ciphertext }         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The version and iteration count are authenticated as associated data, so
//! lowering the stored cost is detected rather than silently honored.
//!
//! ## Failure Reporting
//!
//! Every unseal failure is the same [`Error::BackupRestore`]. A wrong
//! passphrase, a corrupted file and a downgraded header are
//! indistinguishable to the caller.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::DEFAULT_BACKUP_ITERATIONS;
use crate::crypto::{
    base64_array, base64_bytes, decrypt_with_nonce, derive_backup_key, encrypt_with_nonce,
    IdentityKeys, Nonce, PrivateKeyBundle, Salt, NONCE_SIZE, SALT_SIZE,
};
use crate::error::{Error, Result};

/// Current sealed backup format version
pub const BACKUP_VERSION: u32 = 1;

/// Lowest PBKDF2 iteration count accepted for sealing or unsealing
pub const MIN_BACKUP_ITERATIONS: u32 = 200_000;

/// Highest iteration count honored on unseal
pub const MAX_BACKUP_ITERATIONS: u32 = 10_000_000;

const AAD_PREFIX: &[u8] = b"hush-backup";

/// Passphrase-sealed private key bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBackup {
    /// Format version
    pub version: u32,
    /// PBKDF2 iteration count used for this backup
    pub iterations: u32,
    /// PBKDF2 salt
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_SIZE],
    /// AES-GCM nonce
    #[serde(with = "base64_array")]
    pub nonce: [u8; NONCE_SIZE],
    /// Encrypted bundle JSON with tag
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl SealedBackup {
    /// Seal with the default iteration count
    pub fn seal(bundle: &PrivateKeyBundle, passphrase: &str) -> Result<Self> {
        Self::seal_with_iterations(bundle, passphrase, DEFAULT_BACKUP_ITERATIONS)
    }

    /// Seal with an explicit iteration count (at least [`MIN_BACKUP_ITERATIONS`])
    pub fn seal_with_iterations(
        bundle: &PrivateKeyBundle,
        passphrase: &str,
        iterations: u32,
    ) -> Result<Self> {
        if iterations < MIN_BACKUP_ITERATIONS {
            return Err(Error::InvalidConfig(format!(
                "backup iterations must be at least {}, got {}",
                MIN_BACKUP_ITERATIONS, iterations
            )));
        }
        if passphrase.is_empty() {
            return Err(Error::KeyDerivation("Backup passphrase must not be empty".into()));
        }

        let plaintext = Zeroizing::new(
            serde_json::to_vec(bundle).map_err(|e| Error::Serialization(e.to_string()))?,
        );

        let salt = Salt::random()?;
        let nonce = Nonce::random()?;
        let key = derive_backup_key(passphrase.as_bytes(), &salt, iterations);
        let aad = header_aad(BACKUP_VERSION, iterations);
        let ciphertext = encrypt_with_nonce(&key, &nonce, &plaintext, &aad)?;

        tracing::debug!("Sealed key backup with {} PBKDF2 iterations", iterations);

        Ok(Self {
            version: BACKUP_VERSION,
            iterations,
            salt: *salt.as_bytes(),
            nonce: *nonce.as_bytes(),
            ciphertext,
        })
    }

    /// Recover the private key bundle
    ///
    /// Every failure is reported as the opaque `BackupRestore`.
    pub fn unseal(&self, passphrase: &str) -> Result<PrivateKeyBundle> {
        self.try_unseal(passphrase).map_err(|e| {
            // Detail stays in debug logs only
            tracing::debug!("Backup restore failed: {}", e);
            Error::BackupRestore
        })
    }

    fn try_unseal(&self, passphrase: &str) -> Result<PrivateKeyBundle> {
        if self.version != BACKUP_VERSION {
            return Err(Error::Deserialization(format!(
                "unsupported backup version {}",
                self.version
            )));
        }
        if !(MIN_BACKUP_ITERATIONS..=MAX_BACKUP_ITERATIONS).contains(&self.iterations) {
            return Err(Error::Deserialization(format!(
                "iteration count {} out of range",
                self.iterations
            )));
        }

        let key = derive_backup_key(
            passphrase.as_bytes(),
            &Salt::from_bytes(self.salt),
            self.iterations,
        );
        let aad = header_aad(self.version, self.iterations);
        let plaintext = Zeroizing::new(decrypt_with_nonce(
            &key,
            &Nonce::from_bytes(self.nonce),
            &self.ciphertext,
            &aad,
        )?);

        serde_json::from_slice(&plaintext).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Recover the bundle and rebuild the identity keys
    pub fn restore(&self, passphrase: &str) -> Result<IdentityKeys> {
        let bundle = self.unseal(passphrase)?;
        IdentityKeys::from_bundle(&bundle).map_err(|e| {
            tracing::debug!("Backup bundle did not import: {}", e);
            Error::BackupRestore
        })
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Parse from JSON; an undecodable file is `BackupRestore`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            tracing::debug!("Backup file did not parse: {}", e);
            Error::BackupRestore
        })
    }

    /// [`SealedBackup::seal_with_iterations`] on the blocking thread pool
    pub async fn seal_off_thread(
        bundle: PrivateKeyBundle,
        passphrase: Zeroizing<String>,
        iterations: u32,
    ) -> Result<Self> {
        tokio::task::spawn_blocking(move || {
            Self::seal_with_iterations(&bundle, &passphrase, iterations)
        })
        .await
        .map_err(|e| Error::KeyDerivation(format!("Backup task failed: {}", e)))?
    }

    /// [`SealedBackup::unseal`] on the blocking thread pool
    pub async fn unseal_off_thread(self, passphrase: Zeroizing<String>) -> Result<PrivateKeyBundle> {
        tokio::task::spawn_blocking(move || self.unseal(&passphrase))
            .await
            .map_err(|_| Error::BackupRestore)?
    }

    /// [`SealedBackup::restore`] on the blocking thread pool
    pub async fn restore_off_thread(self, passphrase: Zeroizing<String>) -> Result<IdentityKeys> {
        tokio::task::spawn_blocking(move || self.restore(&passphrase))
            .await
            .map_err(|_| Error::BackupRestore)?
    }
}

fn header_aad(version: u32, iterations: u32) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_PREFIX.len() + 8);
    aad.extend_from_slice(AAD_PREFIX);
    aad.extend_from_slice(&version.to_be_bytes());
    aad.extend_from_slice(&iterations.to_be_bytes());
    aad
}

// ============================================================================
// TESTS
// ============================================================================
