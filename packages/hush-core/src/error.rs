//! # Error Handling
//!
//! This module provides the error type shared by every part of Hush Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Errors                                                        │
//! │  │   ├── KeyFormat             - Malformed or mismatched portable key  │
//! │  │   ├── KeyGeneration         - Keypair generation failed             │
//! │  │   ├── KeyExchange           - ECDH could not be performed           │
//! │  │   └── KeyDerivation         - HKDF / PBKDF2 failed                  │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── Encryption            - AEAD / OAEP encryption failed         │
//! │  │   ├── Unwrap                - Wrapped message key rejected          │
//! │  │   ├── Decryption            - Payload AEAD tag rejected             │
//! │  │   ├── IntegrityMismatch     - Stored hash != recomputed hash        │
//! │  │   ├── BackupRestore         - Opaque passphrase/corruption failure  │
//! │  │   └── Entropy               - No secure randomness available        │
//! │  │                                                                      │
//! │  ├── Envelope Errors                                                   │
//! │  │   ├── MalformedEnvelope     - Wire form could not be decoded        │
//! │  │   └── PayloadTooLarge       - Plaintext exceeds configured limit    │
//! │  │                                                                      │
//! │  ├── Collaborator Errors                                               │
//! │  │   ├── NoIdentity            - No keys loaded for a local user       │
//! │  │   ├── IdentityNotFound      - Directory has no record for a user    │
//! │  │   ├── BlobNotFound          - Blob store has no such reference      │
//! │  │   └── Storage               - Message/blob store failure            │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── InvalidConfig                                                 │
//! │      ├── Serialization                                                 │
//! │      └── Deserialization                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! Errors are returned where they are detected. The engine never swallows a
//! failure: an agreement-path wrap error is handed back to the caller, which
//! decides whether to fall back to encapsulation
//! (see [`Error::allows_encapsulation_fallback`]).

use thiserror::Error;

/// Result type alias for Hush Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Hush Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Key Errors (100-199)
    // ========================================================================

    /// A portable key was malformed or belongs to the wrong algorithm
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// Keypair generation failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Diffie-Hellman agreement could not be performed
    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    /// Key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivation(String),

    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The wrapped message key could not be recovered
    #[error("Failed to unwrap message key: {0}")]
    Unwrap(String),

    /// Payload decryption failed
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The stored integrity hash does not match the ciphertext
    ///
    /// `decryptable` records whether the payload still decrypted, which
    /// separates "corrupted in transit" from "tampered and undecryptable".
    #[error("Integrity hash mismatch (payload decryptable: {decryptable})")]
    IntegrityMismatch {
        /// Whether AEAD decryption succeeded despite the mismatch
        decryptable: bool,
    },

    /// Backup could not be restored
    ///
    /// Deliberately carries no detail: a wrong passphrase and a corrupted
    /// backup must be indistinguishable.
    #[error("Backup could not be restored")]
    BackupRestore,

    /// The operating system random source failed
    #[error("Secure random number generation failed")]
    Entropy,

    // ========================================================================
    // Envelope Errors (300-399)
    // ========================================================================

    /// An envelope could not be decoded from its wire form
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Plaintext exceeds the configured size limit
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    // ========================================================================
    // Collaborator Errors (400-499)
    // ========================================================================

    /// No private keys are loaded for this local user
    #[error("No identity loaded for {0}")]
    NoIdentity(String),

    /// The identity directory has no record for this user
    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    /// The blob store has no object for this reference
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// A storage collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Keys
    /// - 200-299: Crypto
    /// - 300-399: Envelope
    /// - 400-499: Collaborators
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Keys (100-199)
            Error::KeyFormat(_) => 100,
            Error::KeyGeneration(_) => 101,
            Error::KeyExchange(_) => 102,
            Error::KeyDerivation(_) => 103,

            // Crypto (200-299)
            Error::Encryption(_) => 200,
            Error::Unwrap(_) => 201,
            Error::Decryption(_) => 202,
            Error::IntegrityMismatch { .. } => 203,
            Error::BackupRestore => 204,
            Error::Entropy => 205,

            // Envelope (300-399)
            Error::MalformedEnvelope(_) => 300,
            Error::PayloadTooLarge { .. } => 301,

            // Collaborators (400-499)
            Error::NoIdentity(_) => 400,
            Error::IdentityNotFound(_) => 401,
            Error::BlobNotFound(_) => 402,
            Error::Storage(_) => 403,

            // Internal (900-999)
            Error::InvalidConfig(_) => 900,
            Error::Serialization(_) => 901,
            Error::Deserialization(_) => 902,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only collaborator failures may succeed on a later attempt. Crypto
    /// failures never do without different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::BlobNotFound(_))
    }

    /// AEAD or OAEP rejected the wrapped key or the payload
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Error::Unwrap(_) | Error::Decryption(_))
    }

    /// The stored integrity hash did not match
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Error::IntegrityMismatch { .. })
    }

    /// Whether a failed agreement-path wrap may be retried via encapsulation
    ///
    /// Entropy failure is excluded: nothing may proceed without randomness.
    pub fn allows_encapsulation_fallback(&self) -> bool {
        matches!(
            self,
            Error::KeyFormat(_)
                | Error::KeyExchange(_)
                | Error::KeyDerivation(_)
                | Error::Encryption(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::Deserialization(err.to_string())
        } else {
            Error::Serialization(err.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
