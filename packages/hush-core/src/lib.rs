//! # Hush Core
//!
//! Client-side envelope encryption for two-party messaging over a relay
//! that stores only ciphertext.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          HUSH CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐                     │
//! │  │   Courier   │  │   KeyRing   │  │    Relay    │                     │
//! │  │             │  │             │  │             │                     │
//! │  │ - Send      │  │ - Load      │  │ - Directory │                     │
//! │  │ - Read chat │  │ - Restore   │  │ - Messages  │                     │
//! │  │ - Files     │  │             │  │ - Blobs     │                     │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘                     │
//! │         │                │                │                             │
//! │         └────────────────┴────────────────┘                             │
//! │                          │                                              │
//! │  ┌─────────────┐  ┌──────┴──────┐  ┌─────────────────────────────────┐ │
//! │  │   Backup    │  │  Envelope   │  │            Crypto               │ │
//! │  │             │  │             │  │                                 │ │
//! │  │ - PBKDF2    │  │ - Seal/Open │  │ - P-256 ECDH + HKDF key wrap   │ │
//! │  │ - Seal      │  │ - Files     │  │ - RSA-4096 OAEP key wrap       │ │
//! │  │ - Restore   │  │ - Integrity │  │ - AES-256-GCM, SHA-256         │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Runtime configuration
//! - [`crypto`] - Primitives, identity keys and key wrapping
//! - [`envelope`] - Message envelopes and file sub-envelopes
//! - [`backup`] - Passphrase-sealed private key backups
//! - [`keyring`] - Session cache of loaded identities
//! - [`relay`] - Directory, message and blob store boundaries
//! - [`courier`] - Send/read coordination over the relay
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Payload Encryption (AES-256-GCM)                             │
//! │  ──────────────────────────────────────────                             │
//! │  Every message and file gets its own one-time key and nonce.           │
//! │                                                                         │
//! │  Layer 2: Key Wrapping (P-256 ECDH + HKDF, or RSA-OAEP)                │
//! │  ──────────────────────────────────────────────────────                 │
//! │  The one-time key is wrapped for the recipient. Agreement is tried     │
//! │  first; the envelope records which path was taken.                     │
//! │                                                                         │
//! │  Layer 3: Integrity Tag (SHA-256)                                      │
//! │  ─────────────────────────────────                                      │
//! │  Anyone holding an envelope can check it against its content hash      │
//! │  without keys.                                                         │
//! │                                                                         │
//! │  Layer 4: Backup Sealing (PBKDF2 + AES-256-GCM)                        │
//! │  ───────────────────────────────────────────────                        │
//! │  Private keys leave the device only under a passphrase.                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use hush_core::{Courier, CoreConfig, IdentityKeys};
//! use hush_core::relay::{MemoryBlobStore, MemoryDirectory, MemoryMessageStore};
//!
//! let courier = Courier::new(
//!     Arc::new(MemoryDirectory::new()),
//!     Arc::new(MemoryMessageStore::new()),
//!     Some(Arc::new(MemoryBlobStore::new())),
//!     CoreConfig::default(),
//! )?;
//!
//! courier.register("alice", None, IdentityKeys::generate()?)?;
//! courier.register("bob", None, IdentityKeys::generate()?)?;
//!
//! courier.send("chat-1", "alice", "bob", "Hello Bob!", None)?;
//! let messages = courier.read_chat("chat-1", "bob")?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backup;
pub mod config;
pub mod courier;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod keyring;
pub mod relay;
/// Wall-clock time utilities.
pub mod time;

#[cfg(test)]
mod test_support;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use backup::SealedBackup;
pub use config::CoreConfig;
pub use courier::{ChatMessage, Courier, MessageOutcome};
pub use crypto::{IdentityKeys, PortableKey, PublicKeys, WrapAlgorithm};
pub use envelope::{FileEnvelope, FilePayload, MessageEnvelope, Recipient, SealedFile};
pub use error::{Error, Result};
pub use keyring::KeyRing;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
