//! # Cryptography Module
//!
//! This module provides all cryptographic primitives used by Hush Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    IDENTITY KEYS                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────────┐         ┌─────────────────┐              │   │
//! │  │  │  Agreement      │         │ Encapsulation   │              │   │
//! │  │  │  (ECDH P-256)   │         │ (RSA-4096 OAEP) │              │   │
//! │  │  │                 │         │                 │              │   │
//! │  │  │ • KEK derive    │         │ • Direct wrap   │              │   │
//! │  │  │ • Preferred     │         │ • Fallback      │              │   │
//! │  │  └─────────────────┘         └─────────────────┘              │   │
//! │  │                                                                 │   │
//! │  │  Fingerprint = SHA-256(canonical(agreement) ‖                  │   │
//! │  │                        canonical(encapsulation))               │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 ENVELOPE SCHEME                                 │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  1. One-time key: 32 random bytes per message                  │   │
//! │  │                                                                 │   │
//! │  │  2. Payload: AES-256-GCM                                       │   │
//! │  │     • 96-bit nonce (random per message)                        │   │
//! │  │     • 128-bit authentication tag                               │   │
//! │  │                                                                 │   │
//! │  │  3. Key wrap: agreement KEK, or RSA-OAEP as fallback           │   │
//! │  │                                                                 │   │
//! │  │  4. Integrity: hex SHA-256 over base64(ciphertext)             │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | ECDH P-256 | Key agreement |
//! | RSA-4096 OAEP/SHA-256 | Key encapsulation |
//! | AES-256-GCM | Payloads, key wrap, backups |
//! | HKDF-SHA256 | KEK derivation |
//! | PBKDF2-HMAC-SHA256 | Backup passphrase stretching |
//! | SHA-256 | Integrity hash, fingerprint |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: Secret keys and unwrapped key bytes are zeroized when dropped
//! 2. **Secure Random**: `OsRng` through fallible calls; failure is `Error::Entropy`
//! 3. **No Key Reuse**: Every payload key encrypts exactly once; every KEK wraps once

pub mod diagnostics;
mod encoding;
mod encryption;
mod hash;
mod kdf;
mod keys;
mod portable;
mod wrap;

pub use encoding::{from_base64, from_base64url, from_hex, to_base64, to_base64url, to_hex};
pub(crate) use encoding::{base64_array, base64_bytes};
pub use encryption::{
    decrypt, decrypt_with_nonce, encrypt, encrypt_with_nonce, fill_random, MessageKey, Nonce,
    Salt, KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE,
};
pub use hash::{content_hash, digests_match, sha256, sha256_concat, DIGEST_SIZE};
pub use kdf::{derive_backup_key, derive_kek, domain, KeyEncryptionKey};
pub use keys::{
    fingerprint, fingerprint_portable, AgreementKeyPair, AgreementPublicKey,
    EncapsulationKeyPair, EncapsulationPublicKey, IdentityKeys, PrivateKeyBundle, PublicKeys,
    ENCAPSULATION_KEY_BITS, MIN_ENCAPSULATION_KEY_BITS, PUBLIC_EXPONENT,
};
pub use portable::{PortableKey, ALG_RSA_OAEP_256, CRV_P256, KTY_EC, KTY_RSA};
pub use wrap::{
    unwrap_with_agreement, unwrap_with_encapsulation, wrap_with_agreement,
    wrap_with_encapsulation, WrapAlgorithm,
};
