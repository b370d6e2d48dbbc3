//! File sub-envelopes.
//!
//! A file attached to a message is sealed under its own one-time key and
//! salt, independent of the caption's. Small ciphertexts may ride inline in
//! the envelope; larger ones are uploaded by the caller and referenced.
//!
//! ```text
//! seal_file(bytes) ──► SealedFile { ciphertext, metadata }
//!                          │
//!           ┌──────────────┴──────────────┐
//!           ▼                             ▼
//!   .into_inline()                .into_referenced(blob_ref)
//!   payload = Inline(ct)          payload = Referenced(blob_ref)
//! ```

use serde::{Deserialize, Serialize};

use super::{check_ciphertext_len, integrity_hash, PayloadParts, Recipient, SealedPayload};
use crate::crypto::{
    base64_array, base64_bytes, digests_match, domain, AgreementKeyPair, IdentityKeys, Nonce,
    PortableKey, Salt, WrapAlgorithm, NONCE_SIZE, SALT_SIZE,
};
use crate::error::{Error, Result};

/// Where a file's ciphertext lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum FilePayload {
    /// Ciphertext embedded in the envelope
    Inline(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Opaque blob store reference
    Referenced(String),
}

/// Sealed file metadata and payload location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEnvelope {
    /// AES-GCM nonce
    #[serde(with = "base64_array")]
    pub nonce: [u8; NONCE_SIZE],
    /// HKDF salt
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_SIZE],
    /// Wrapped one-time file key
    #[serde(with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
    /// Which wrap path produced `wrapped_key`
    pub wrap_algorithm: WrapAlgorithm,
    /// Hex SHA-256 over base64(ciphertext)
    pub integrity_hash: String,
    /// Ciphertext or reference to it
    pub payload: FilePayload,
}

/// A freshly sealed file whose ciphertext has not been placed yet
pub struct SealedFile {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
    salt: [u8; SALT_SIZE],
    wrapped_key: Vec<u8>,
    wrap_algorithm: WrapAlgorithm,
    integrity_hash: String,
}

impl SealedFile {
    /// Seal file contents for `recipient`
    pub fn seal(plaintext: &[u8], sender: &AgreementKeyPair, recipient: &Recipient<'_>) -> Result<Self> {
        let sealed = SealedPayload::seal(plaintext, sender, recipient, domain::FILE_KEK)?;

        tracing::debug!(
            "Sealed {} byte file via {}",
            plaintext.len(),
            sealed.wrap_algorithm
        );

        Ok(Self {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            salt: sealed.salt,
            wrapped_key: sealed.wrapped_key,
            wrap_algorithm: sealed.wrap_algorithm,
            integrity_hash: sealed.integrity_hash,
        })
    }

    /// The ciphertext to upload or embed
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Finish with the ciphertext embedded
    pub fn into_inline(self) -> FileEnvelope {
        let Self {
            ciphertext,
            nonce,
            salt,
            wrapped_key,
            wrap_algorithm,
            integrity_hash,
        } = self;
        FileEnvelope {
            nonce,
            salt,
            wrapped_key,
            wrap_algorithm,
            integrity_hash,
            payload: FilePayload::Inline(ciphertext),
        }
    }

    /// Finish with a reference to where the caller stored the ciphertext
    pub fn into_referenced(self, reference: impl Into<String>) -> FileEnvelope {
        FileEnvelope {
            nonce: self.nonce,
            salt: self.salt,
            wrapped_key: self.wrapped_key,
            wrap_algorithm: self.wrap_algorithm,
            integrity_hash: self.integrity_hash,
            payload: FilePayload::Referenced(reference.into()),
        }
    }
}

impl FileEnvelope {
    /// Blob reference, if the ciphertext is stored out of line
    pub fn reference(&self) -> Option<&str> {
        match &self.payload {
            FilePayload::Referenced(reference) => Some(reference.as_str()),
            FilePayload::Inline(_) => None,
        }
    }

    /// Check the integrity hash against a ciphertext
    ///
    /// For inline payloads `fetched` is ignored.
    pub fn verify_integrity(&self, fetched: Option<&[u8]>) -> bool {
        match self.resolve(fetched) {
            Ok(ciphertext) => digests_match(&integrity_hash(ciphertext), &self.integrity_hash),
            Err(_) => false,
        }
    }

    /// Open the file
    ///
    /// `fetched` is the ciphertext retrieved from the blob store for
    /// referenced payloads. Same failure contract as
    /// [`MessageEnvelope::open`](super::MessageEnvelope::open).
    pub fn open(
        &self,
        own: &IdentityKeys,
        sender_agreement: Option<&PortableKey>,
        fetched: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let ciphertext = self.resolve(fetched)?;
        check_ciphertext_len(ciphertext)?;

        let integrity_ok = digests_match(&integrity_hash(ciphertext), &self.integrity_hash);

        let parts = PayloadParts {
            ciphertext,
            nonce: Nonce::from_bytes(self.nonce),
            salt: Salt::from_bytes(self.salt),
            wrapped_key: &self.wrapped_key,
            wrap_algorithm: self.wrap_algorithm,
        };
        let decryption = parts.open(own, sender_agreement, domain::FILE_KEK);

        if !integrity_ok {
            tracing::warn!("File integrity hash mismatch");
            return Err(Error::IntegrityMismatch {
                decryptable: decryption.is_ok(),
            });
        }
        decryption
    }

    fn resolve<'a>(&'a self, fetched: Option<&'a [u8]>) -> Result<&'a [u8]> {
        match (&self.payload, fetched) {
            (FilePayload::Inline(ciphertext), _) => Ok(ciphertext.as_slice()),
            (FilePayload::Referenced(_), Some(ciphertext)) => Ok(ciphertext),
            (FilePayload::Referenced(reference), None) => Err(Error::MalformedEnvelope(format!(
                "file ciphertext for '{}' was not supplied",
                reference
            ))),
        }
    }
}
