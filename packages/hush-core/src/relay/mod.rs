//! # Relay Module
//!
//! Boundary traits for the untrusted services the envelope layer talks to,
//! with in-memory implementations for tests, demos and local use.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      RELAY COLLABORATORS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐         │
//! │  │ IdentityDirectory│  │  MessageStore   │  │   BlobStore     │         │
//! │  │                 │  │                 │  │                 │         │
//! │  │ - publish       │  │ - append        │  │ - put           │         │
//! │  │ - lookup        │  │ - list(chat)    │  │ - get           │         │
//! │  │ - display name  │  │                 │  │                 │         │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘         │
//! │                                                                         │
//! │  All three see only public keys, envelopes and ciphertext.             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod blobs;
mod directory;
mod messages;

pub use blobs::{BlobStore, MemoryBlobStore};
pub use directory::{verify_fingerprint, IdentityDirectory, MemoryDirectory, PublicIdentityRecord};
pub use messages::{MemoryMessageStore, MessageStore, StoredMessage};
