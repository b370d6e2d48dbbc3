//! # Key Derivation Functions
//!
//! This module derives the two kinds of symmetric key that are never drawn
//! directly from the random source: per-message key-encryption keys and
//! passphrase backup keys.
//!
//! ## Key-Encryption Key (KEK)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 SHARED SECRET → KEY-ENCRYPTION KEY                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    P-256 ECDH SHARED SECRET                     │   │
//! │  │                                                                 │   │
//! │  │  sender_private × recipient_public                             │   │
//! │  │      = recipient_private × sender_public                       │   │
//! │  │                                                                 │   │
//! │  │  → 32 bytes (x coordinate)                                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HKDF KEY DERIVATION                          │   │
//! │  │                                                                 │   │
//! │  │  HKDF-SHA256(                                                  │   │
//! │  │    ikm  = shared_secret,                                      │   │
//! │  │    salt = per-message salt (16 random bytes),                 │   │
//! │  │    info = "hush-message-kek-v1" | "hush-file-kek-v1"          │   │
//! │  │  )                                                            │   │
//! │  │                                                                 │   │
//! │  │  → 32-byte AES-256-GCM key, usable for ONE wrap or unwrap     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  The same two parties get a distinct KEK for every message because    │
//! │  the salt is fresh. Compromise of one KEK exposes one message key.     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Backup Key
//!
//! `PBKDF2-HMAC-SHA256(passphrase, salt, iterations)` → 32 bytes. The
//! iteration count travels with the sealed backup.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::encryption::{decrypt_with_nonce, encrypt_with_nonce, Nonce, Salt, KEY_SIZE};
use super::keys::{AgreementKeyPair, AgreementPublicKey};
use crate::error::{Error, Result};

/// Domain separation strings for HKDF
///
/// Message and file keys are wrapped under independent KEKs even when the
/// same salt were ever reused across the two.
pub mod domain {
    /// KEK for the message body key
    pub const MESSAGE_KEK: &[u8] = b"hush-message-kek-v1";

    /// KEK for a file sub-envelope key
    pub const FILE_KEK: &[u8] = b"hush-file-kek-v1";
}

/// A single-use AES-256 key-encryption key
///
/// Can only wrap or unwrap, and is consumed by doing so. Since a KEK is tied
/// to one salt, and the wrap nonce comes from that salt, consuming the key
/// guarantees it never encrypts under two nonces or one nonce twice.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyEncryptionKey([u8; KEY_SIZE]);

impl KeyEncryptionKey {
    /// Encrypt `key_bytes` and consume the KEK
    pub(crate) fn wrap_key(self, nonce: &Nonce, key_bytes: &[u8]) -> Result<Vec<u8>> {
        encrypt_with_nonce(&self.0, nonce, key_bytes, b"")
    }

    /// Decrypt `wrapped` and consume the KEK
    ///
    /// Tag failure is reported as `Unwrap`.
    pub(crate) fn unwrap_key(self, nonce: &Nonce, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        decrypt_with_nonce(&self.0, nonce, wrapped, b"")
            .map(Zeroizing::new)
            .map_err(|_| Error::Unwrap("key-encryption key rejected the wrapped key".into()))
    }
}

impl std::fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyEncryptionKey([REDACTED])")
    }
}

/// Derive a key-encryption key from an agreement between two identities
///
/// ## Parameters
///
/// - `own`: the caller's agreement keypair
/// - `peer`: the counterparty's agreement public key
/// - `salt`: the per-message salt (HKDF salt)
/// - `info`: a [`domain`] context string
pub fn derive_kek(
    own: &AgreementKeyPair,
    peer: &AgreementPublicKey,
    salt: &Salt,
    info: &[u8],
) -> Result<KeyEncryptionKey> {
    let shared = own.diffie_hellman(peer);
    let hkdf = Hkdf::<Sha256>::new(Some(salt.as_bytes()), shared.raw_secret_bytes());

    let mut kek = [0u8; KEY_SIZE];
    hkdf.expand(info, &mut kek)
        .map_err(|_| Error::KeyDerivation("Failed to derive key-encryption key".into()))?;

    Ok(KeyEncryptionKey(kek))
}

/// Stretch a passphrase into a 256-bit backup key
pub fn derive_backup_key(
    passphrase: &[u8],
    salt: &Salt,
    iterations: u32,
) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt.as_bytes(), iterations, &mut *key);
    key
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kek_agrees_between_parties() {
        let alice = AgreementKeyPair::generate().unwrap();
        let bob = AgreementKeyPair::generate().unwrap();
        let salt = Salt::random().unwrap();
        let nonce = salt.wrap_nonce();

        let wrapped = derive_kek(&alice, bob.public_key(), &salt, domain::MESSAGE_KEK)
            .unwrap()
            .wrap_key(&nonce, b"one-time key bytes")
            .unwrap();
        let unwrapped = derive_kek(&bob, alice.public_key(), &salt, domain::MESSAGE_KEK)
            .unwrap()
            .unwrap_key(&nonce, &wrapped)
            .unwrap();

        assert_eq!(unwrapped.as_slice(), b"one-time key bytes");
    }

    #[test]
    fn test_different_salts_different_keks() {
        let alice = AgreementKeyPair::generate().unwrap();
        let bob = AgreementKeyPair::generate().unwrap();
        let nonce = Nonce::from_bytes([0u8; 12]);

        let a = derive_kek(&alice, bob.public_key(), &Salt::from_bytes([1u8; 16]), domain::MESSAGE_KEK)
            .unwrap()
            .wrap_key(&nonce, &[0u8; 32])
            .unwrap();
        let b = derive_kek(&alice, bob.public_key(), &Salt::from_bytes([2u8; 16]), domain::MESSAGE_KEK)
            .unwrap()
            .wrap_key(&nonce, &[0u8; 32])
            .unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_domains_are_separated() {
        let alice = AgreementKeyPair::generate().unwrap();
        let bob = AgreementKeyPair::generate().unwrap();
        let salt = Salt::random().unwrap();
        let nonce = salt.wrap_nonce();

        let wrapped = derive_kek(&alice, bob.public_key(), &salt, domain::MESSAGE_KEK)
            .unwrap()
            .wrap_key(&nonce, &[7u8; 32])
            .unwrap();
        let result = derive_kek(&bob, alice.public_key(), &salt, domain::FILE_KEK)
            .unwrap()
            .unwrap_key(&nonce, &wrapped);

        assert!(matches!(result, Err(Error::Unwrap(_))));
    }

    #[test]
    fn test_backup_key_deterministic() {
        let salt = Salt::from_bytes([9u8; 16]);

        let k1 = derive_backup_key(b"correct horse", &salt, 1_000);
        let k2 = derive_backup_key(b"correct horse", &salt, 1_000);
        let k3 = derive_backup_key(b"correct horse", &salt, 1_001);
        let k4 = derive_backup_key(b"battery staple", &salt, 1_000);

        assert_eq!(*k1, *k2);
        assert_ne!(*k1, *k3);
        assert_ne!(*k1, *k4);
    }

    #[test]
    fn test_kek_debug_redacted() {
        let alice = AgreementKeyPair::generate().unwrap();
        let kek = derive_kek(&alice, alice.public_key(), &Salt::random().unwrap(), domain::MESSAGE_KEK)
            .unwrap();
        assert_eq!(format!("{:?}", kek), "KeyEncryptionKey([REDACTED])");
    }
}
