//! # Encryption Module
//!
//! AES-256-GCM wrapper used for message payloads, file payloads, key
//! wrapping and backups.
//!
//! ## Payload Encryption
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      PAYLOAD ENCRYPTION                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Fresh one-time key                                            │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  MessageKey = 32 random bytes from the OS CSPRNG            │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Fresh nonce                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Nonce = 12 random bytes                                    │       │
//! │  │  (a nonce is only ever paired with a brand new key)         │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: Encrypt                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(key, nonce, plaintext, aad)                    │       │
//! │  │           ↓                                                  │       │
//! │  │  Ciphertext (len = plaintext + 16-byte tag)                 │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Randomness
//!
//! All randomness comes from `OsRng` through the fallible `try_fill_bytes`.
//! A failing random source surfaces as [`Error::Entropy`] instead of a
//! panic, and no operation continues past it.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the per-message salt in bytes (128 bits)
pub const SALT_SIZE: usize = 16;

/// Fill `buf` from the operating system CSPRNG
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        tracing::error!("OS random source failed: {}", e);
        Error::Entropy
    })
}

/// A nonce (number used once) for AES-GCM encryption
///
/// ## Critical Security Requirement
///
/// **NEVER reuse a nonce with the same key!**
///
/// Nonce reuse under one key leaks the GHASH authentication key and the XOR
/// of the two plaintexts. Every [`MessageKey`] in this crate is used for a
/// single encryption, so a random nonce per key is sufficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; NONCE_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Per-message salt
///
/// Feeds HKDF when deriving the key-encryption key, and its first 12 bytes
/// double as the wrap nonce on the agreement path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Salt(pub [u8; SALT_SIZE]);

impl Salt {
    /// Generate a cryptographically random salt
    pub fn random() -> Result<Self> {
        let mut bytes = [0u8; SALT_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }

    /// The first 12 salt bytes reinterpreted as an AES-GCM nonce
    ///
    /// Only valid for a key that is used exactly once, such as a freshly
    /// derived KEK.
    pub fn wrap_nonce(&self) -> Nonce {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&self.0[..NONCE_SIZE]);
        Nonce(nonce)
    }
}

/// A one-time AES-256-GCM key for a single payload
///
/// Zeroized when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MessageKey([u8; KEY_SIZE]);

impl MessageKey {
    /// Generate a fresh random key
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Recreate from an unwrapped byte buffer
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::Unwrap(format!(
                "Unwrapped key has {} bytes, expected {}",
                bytes.len(),
                KEY_SIZE
            ))
        })?;
        Ok(Self(key))
    }

    /// Get the raw key bytes (for wrapping)
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MessageKey([REDACTED])")
    }
}

/// Encrypt under an explicit nonce
///
/// Callers are responsible for never pairing `nonce` with `key` twice.
pub fn encrypt_with_nonce(
    key: &[u8; KEY_SIZE],
    nonce: &Nonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Encryption(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|e| Error::Encryption(format!("Encryption failed: {}", e)))
}

/// Decrypt and verify under an explicit nonce
///
/// Returns `Decryption` if the tag does not verify. No plaintext is
/// returned on failure.
pub fn decrypt_with_nonce(
    key: &[u8; KEY_SIZE],
    nonce: &Nonce,
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Decryption(format!("Invalid key: {}", e)))?;

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|_| Error::Decryption("authentication tag mismatch".into()))
}

/// Encrypt a payload with a one-time key under a fresh random nonce
///
/// ## Returns
///
/// Tuple of (nonce, ciphertext_with_tag)
pub fn encrypt(key: &MessageKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random()?;
    let ciphertext = encrypt_with_nonce(&key.0, &nonce, plaintext, aad)?;
    Ok((nonce, ciphertext))
}

/// Decrypt a payload encrypted with [`encrypt`]
///
/// ## Errors
///
/// Returns `Decryption` if:
/// - The ciphertext was tampered with
/// - The AAD doesn't match
/// - The key is wrong
/// - The nonce is wrong
pub fn decrypt(key: &MessageKey, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    decrypt_with_nonce(&key.0, nonce, ciphertext, aad)
}

// ============================================================================
// TESTS
// ============================================================================
