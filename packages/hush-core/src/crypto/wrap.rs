//! # Key Wrapping
//!
//! Protects a one-time [`MessageKey`] for a single recipient.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         WRAP PATHS                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Agreement (preferred)                                                 │
//! │  ─────────────────────                                                 │
//! │  KEK  = HKDF(ECDH(own_priv, peer_pub), salt, info)                     │
//! │  wrap = AES-256-GCM(KEK, nonce = salt[0..12], message_key)             │
//! │       → 32 + 16 = 48 bytes                                             │
//! │                                                                         │
//! │  Encapsulation (fallback)                                              │
//! │  ────────────────────────                                              │
//! │  wrap = RSA-OAEP-SHA256(peer_encapsulation_pub, message_key)           │
//! │       → modulus size (512 bytes for RSA-4096)                          │
//! │                                                                         │
//! │  The envelope records which path was taken. The receiver never         │
//! │  guesses; it dispatches on that tag alone.                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rand::rngs::OsRng;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::encryption::{MessageKey, Salt};
use super::kdf::derive_kek;
use super::keys::{AgreementKeyPair, AgreementPublicKey, EncapsulationKeyPair, EncapsulationPublicKey};
use crate::error::{Error, Result};

/// How a message key was wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapAlgorithm {
    /// ECDH + HKDF key-encryption key, AES-GCM wrap
    Agreement,
    /// RSA-OAEP with SHA-256
    Encapsulation,
}

impl WrapAlgorithm {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapAlgorithm::Agreement => "agreement",
            WrapAlgorithm::Encapsulation => "encapsulation",
        }
    }
}

impl std::fmt::Display for WrapAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrap a message key under a KEK agreed with `peer`
pub fn wrap_with_agreement(
    message_key: &MessageKey,
    own: &AgreementKeyPair,
    peer: &AgreementPublicKey,
    salt: &Salt,
    info: &[u8],
) -> Result<Vec<u8>> {
    derive_kek(own, peer, salt, info)?.wrap_key(&salt.wrap_nonce(), message_key.as_bytes())
}

/// Recover a message key wrapped by [`wrap_with_agreement`]
///
/// `peer` is the sender's agreement public key. A wrong key pair, salt or
/// info, or any tampering with `wrapped`, yields `Unwrap`.
pub fn unwrap_with_agreement(
    wrapped: &[u8],
    own: &AgreementKeyPair,
    peer: &AgreementPublicKey,
    salt: &Salt,
    info: &[u8],
) -> Result<MessageKey> {
    let raw = derive_kek(own, peer, salt, info)?.unwrap_key(&salt.wrap_nonce(), wrapped)?;
    MessageKey::from_slice(&raw)
}

/// Wrap a message key directly to the recipient's encapsulation key
pub fn wrap_with_encapsulation(
    message_key: &MessageKey,
    peer: &EncapsulationPublicKey,
) -> Result<Vec<u8>> {
    peer.as_inner()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), message_key.as_bytes())
        .map_err(|e| Error::Encryption(format!("OAEP wrap failed: {}", e)))
}

/// Recover a message key wrapped by [`wrap_with_encapsulation`]
pub fn unwrap_with_encapsulation(wrapped: &[u8], own: &EncapsulationKeyPair) -> Result<MessageKey> {
    let raw = own
        .as_inner()
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| Error::Unwrap("OAEP decryption failed".into()))?;
    MessageKey::from_slice(&raw)
}
