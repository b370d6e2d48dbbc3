//! # Envelope Module
//!
//! Sealing and opening of message envelopes and file sub-envelopes.
//!
//! ## Seal Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SEAL                                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Sender (Alice)                                                        │
//! │  ─────────────────────────────────────────────────────────────         │
//! │                                                                         │
//! │  Input: "Hello Bob!"                                                   │
//! │                                                                         │
//! │  1. Fresh material                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  message_key = 32 random bytes                              │       │
//! │  │  nonce       = 12 random bytes                              │       │
//! │  │  salt        = 16 random bytes                              │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  2. Encrypt                                                            │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  ciphertext = AES-256-GCM(message_key, nonce, plaintext)    │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  3. Wrap message_key                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  try agreement(alice_p256, bob_p256_pub, salt)              │       │
//! │  │     └─ eligible failure ──► encapsulation(bob_rsa_pub)      │       │
//! │  │  record which one in wrap_algorithm                         │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  4. Integrity tag                                                      │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  integrity_hash = hex(SHA-256(base64(ciphertext)))          │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Open Flow
//!
//! The receiver recomputes the integrity hash, unwraps the key by the
//! recorded algorithm (never by guessing) and decrypts. The two checks are
//! independent: [`MessageEnvelope::open_report`] exposes both results, while
//! [`MessageEnvelope::open`] returns plaintext only when both pass.
//!
//! ## Wire Format
//!
//! ```text
//! {
//!   "ciphertext": "base64...",          // plaintext + 16-byte tag
//!   "nonce": "base64...",               // 12 bytes
//!   "salt": "base64...",                // 16 bytes
//!   "wrapped_key": "base64...",         // 48 (agreement) or 512 (RSA-4096)
//!   "wrap_algorithm": "agreement",      // or "encapsulation"
//!   "integrity_hash": "hex...",         // 64 lowercase hex chars
//!   "file": { ... }                     // optional file sub-envelope
//! }
//! ```

mod file;

pub use file::{FileEnvelope, FilePayload, SealedFile};

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_MESSAGE_SIZE;
use crate::crypto::{
    base64_array, base64_bytes, content_hash, decrypt, digests_match, domain, encrypt,
    to_base64, unwrap_with_agreement, unwrap_with_encapsulation, wrap_with_agreement,
    wrap_with_encapsulation, AgreementKeyPair, AgreementPublicKey, EncapsulationPublicKey,
    IdentityKeys, MessageKey, Nonce, PortableKey, Salt, WrapAlgorithm, NONCE_SIZE, SALT_SIZE,
    TAG_SIZE,
};
use crate::error::{Error, Result};

/// Public keys of the party an envelope is sealed for
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    /// Published agreement key, if the recipient has one
    ///
    /// Kept in portable form so a malformed published key is detected by
    /// the agreement attempt itself.
    pub agreement: Option<&'a PortableKey>,
    /// Encapsulation key, if the published one could be imported
    ///
    /// Only consulted when the agreement attempt fails.
    pub encapsulation: Option<&'a EncapsulationPublicKey>,
}

/// Integrity hash of a ciphertext
///
/// Hex SHA-256 over the standard base64 text of the ciphertext, so it can
/// be recomputed directly from the wire form.
pub fn integrity_hash(ciphertext: &[u8]) -> String {
    content_hash(to_base64(ciphertext).as_bytes())
}

/// Encrypted message envelope for wire transmission
///
/// Immutable once sealed. Everything needed to open it, except the
/// recipient's private keys and the sender's agreement public key, travels
/// inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// AES-GCM ciphertext with appended tag
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// AES-GCM nonce
    #[serde(with = "base64_array")]
    pub nonce: [u8; NONCE_SIZE],
    /// HKDF salt (also the agreement wrap nonce source)
    #[serde(with = "base64_array")]
    pub salt: [u8; SALT_SIZE],
    /// Wrapped one-time key
    #[serde(with = "base64_bytes")]
    pub wrapped_key: Vec<u8>,
    /// Which wrap path produced `wrapped_key`
    pub wrap_algorithm: WrapAlgorithm,
    /// Hex SHA-256 over base64(ciphertext)
    pub integrity_hash: String,
    /// Attached file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileEnvelope>,
}

impl MessageEnvelope {
    /// Seal a message body for `recipient`
    ///
    /// Bodies larger than the default 64 KiB limit are rejected; use
    /// [`MessageEnvelope::seal_with_limit`] for a configured limit.
    pub fn seal(plaintext: &[u8], sender: &AgreementKeyPair, recipient: &Recipient<'_>) -> Result<Self> {
        Self::seal_with_limit(plaintext, sender, recipient, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Seal a message body, rejecting bodies over `max_size` bytes
    pub fn seal_with_limit(
        plaintext: &[u8],
        sender: &AgreementKeyPair,
        recipient: &Recipient<'_>,
        max_size: usize,
    ) -> Result<Self> {
        if plaintext.len() > max_size {
            return Err(Error::PayloadTooLarge {
                size: plaintext.len(),
                max: max_size,
            });
        }

        let sealed = SealedPayload::seal(plaintext, sender, recipient, domain::MESSAGE_KEK)?;

        tracing::debug!(
            "Sealed {} byte message via {}",
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
            file: None,
        })
    }

    /// Attach a file sub-envelope
    pub fn with_file(mut self, file: FileEnvelope) -> Self {
        self.file = Some(file);
        self
    }

    /// The payload nonce
    pub fn nonce(&self) -> Nonce {
        Nonce::from_bytes(self.nonce)
    }

    /// The per-message salt
    pub fn salt(&self) -> Salt {
        Salt::from_bytes(self.salt)
    }

    /// Check the stored integrity hash against the ciphertext
    ///
    /// Needs no keys; any holder of the envelope, including the relay, can
    /// run it.
    pub fn verify_integrity(&self) -> bool {
        digests_match(&integrity_hash(&self.ciphertext), &self.integrity_hash)
    }

    /// Open the envelope
    ///
    /// `sender_agreement` is the sender's published agreement key; it is
    /// only consulted for agreement-wrapped envelopes.
    ///
    /// ## Errors
    ///
    /// - `IntegrityMismatch` if the hash does not match, whether or not the
    ///   payload still decrypts. No plaintext is returned in that case.
    /// - `Unwrap` if the message key cannot be recovered.
    /// - `Decryption` if the payload tag does not verify.
    pub fn open(&self, own: &IdentityKeys, sender_agreement: Option<&PortableKey>) -> Result<Vec<u8>> {
        self.open_report(own, sender_agreement).into_result()
    }

    /// Open the envelope and report integrity and decryption separately
    pub fn open_report(&self, own: &IdentityKeys, sender_agreement: Option<&PortableKey>) -> OpenReport {
        let integrity_ok = self.verify_integrity();
        if !integrity_ok {
            tracing::warn!("Envelope integrity hash mismatch");
        }

        let parts = PayloadParts {
            ciphertext: &self.ciphertext,
            nonce: self.nonce(),
            salt: self.salt(),
            wrapped_key: &self.wrapped_key,
            wrap_algorithm: self.wrap_algorithm,
        };
        let decryption = parts.open(own, sender_agreement, domain::MESSAGE_KEK);

        OpenReport {
            integrity_ok,
            decryption,
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON
    ///
    /// Unknown wrap algorithms, wrong nonce or salt lengths, invalid base64
    /// and truncated ciphertexts are all `MalformedEnvelope`.
    pub fn from_json(json: &str) -> Result<Self> {
        let envelope: Self =
            serde_json::from_str(json).map_err(|e| Error::MalformedEnvelope(e.to_string()))?;
        check_ciphertext_len(&envelope.ciphertext)?;
        if let Some(FileEnvelope {
            payload: FilePayload::Inline(ciphertext),
            ..
        }) = &envelope.file
        {
            check_ciphertext_len(ciphertext)?;
        }
        Ok(envelope)
    }
}

pub(crate) fn check_ciphertext_len(ciphertext: &[u8]) -> Result<()> {
    if ciphertext.len() < TAG_SIZE {
        return Err(Error::MalformedEnvelope(format!(
            "ciphertext of {} bytes is shorter than the {}-byte tag",
            ciphertext.len(),
            TAG_SIZE
        )));
    }
    Ok(())
}

/// Result of opening an envelope with both checks reported
pub struct OpenReport {
    /// Whether the stored integrity hash matched
    pub integrity_ok: bool,
    /// Unwrap + AEAD result, independent of `integrity_ok`
    pub decryption: Result<Vec<u8>>,
}

impl OpenReport {
    /// Whether the payload decrypted
    pub fn decryptable(&self) -> bool {
        self.decryption.is_ok()
    }

    /// Plaintext only if both checks passed
    pub fn into_result(self) -> Result<Vec<u8>> {
        if !self.integrity_ok {
            return Err(Error::IntegrityMismatch {
                decryptable: self.decryption.is_ok(),
            });
        }
        self.decryption
    }
}

impl std::fmt::Debug for OpenReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenReport")
            .field("integrity_ok", &self.integrity_ok)
            .field("decryption", &self.decryption.as_ref().map(|pt| pt.len()))
            .finish()
    }
}

// ============================================================================
// SHARED SEAL / OPEN
// ============================================================================

/// Output of sealing one payload under its own key
pub(crate) struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
    pub salt: [u8; SALT_SIZE],
    pub wrapped_key: Vec<u8>,
    pub wrap_algorithm: WrapAlgorithm,
    pub integrity_hash: String,
}

impl SealedPayload {
    pub(crate) fn seal(
        plaintext: &[u8],
        sender: &AgreementKeyPair,
        recipient: &Recipient<'_>,
        info: &[u8],
    ) -> Result<Self> {
        let message_key = MessageKey::generate()?;
        let salt = Salt::random()?;
        let (nonce, ciphertext) = encrypt(&message_key, plaintext, b"")?;
        let (wrap_algorithm, wrapped_key) = wrap_message_key(&message_key, sender, recipient, &salt, info)?;

        Ok(Self {
            integrity_hash: integrity_hash(&ciphertext),
            ciphertext,
            nonce: *nonce.as_bytes(),
            salt: *salt.as_bytes(),
            wrapped_key,
            wrap_algorithm,
        })
    }
}

/// Borrowed view of the fields needed to decrypt one payload
pub(crate) struct PayloadParts<'a> {
    pub ciphertext: &'a [u8],
    pub nonce: Nonce,
    pub salt: Salt,
    pub wrapped_key: &'a [u8],
    pub wrap_algorithm: WrapAlgorithm,
}

impl PayloadParts<'_> {
    pub(crate) fn open(
        &self,
        own: &IdentityKeys,
        sender_agreement: Option<&PortableKey>,
        info: &[u8],
    ) -> Result<Vec<u8>> {
        let message_key = match self.wrap_algorithm {
            WrapAlgorithm::Agreement => {
                let sender = sender_agreement.ok_or_else(|| {
                    Error::Unwrap("sender agreement key required for agreement-wrapped key".into())
                })?;
                let sender = AgreementPublicKey::from_portable(sender)?;
                unwrap_with_agreement(self.wrapped_key, &own.agreement, &sender, &self.salt, info)?
            }
            WrapAlgorithm::Encapsulation => {
                unwrap_with_encapsulation(self.wrapped_key, &own.encapsulation)?
            }
        };

        decrypt(&message_key, &self.nonce, self.ciphertext, b"")
    }
}

/// Wrap `message_key`, preferring agreement and falling back to encapsulation
///
/// Only errors for which [`Error::allows_encapsulation_fallback`] holds
/// trigger the fallback; anything else (notably `Entropy`) is returned.
pub(crate) fn wrap_message_key(
    message_key: &MessageKey,
    sender: &AgreementKeyPair,
    recipient: &Recipient<'_>,
    salt: &Salt,
    info: &[u8],
) -> Result<(WrapAlgorithm, Vec<u8>)> {
    let attempt = match recipient.agreement {
        Some(peer) => AgreementPublicKey::from_portable(peer)
            .and_then(|peer| wrap_with_agreement(message_key, sender, &peer, salt, info)),
        None => Err(Error::KeyExchange("recipient has no agreement key".into())),
    };

    match attempt {
        Ok(wrapped) => Ok((WrapAlgorithm::Agreement, wrapped)),
        Err(e) if e.allows_encapsulation_fallback() => {
            tracing::warn!("Agreement wrap unavailable, falling back to encapsulation: {}", e);
            let peer = recipient.encapsulation.ok_or_else(|| {
                Error::KeyFormat(format!("{}; recipient has no usable encapsulation key", e))
            })?;
            let wrapped = wrap_with_encapsulation(message_key, peer)?;
            Ok((WrapAlgorithm::Encapsulation, wrapped))
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{to_base64url, KTY_RSA};
    use crate::test_support::{alice, bob, mallory};
    use proptest::prelude::*;

    fn bob_with(agreement: Option<&PortableKey>) -> Recipient<'_> {
        Recipient {
            agreement,
            encapsulation: Some(bob().encapsulation.public_key()),
        }
    }

    fn seal_for_bob(plaintext: &[u8]) -> MessageEnvelope {
        let agreement = bob().agreement.export_public();
        MessageEnvelope::seal(plaintext, &alice().agreement, &bob_with(Some(&agreement))).unwrap()
    }

    fn open_as_bob(envelope: &MessageEnvelope) -> Result<Vec<u8>> {
        envelope.open(bob(), Some(&alice().agreement.export_public()))
    }

    #[test]
    fn test_seal_open_round_trip() {
        let envelope = seal_for_bob(b"Hello Bob!");

        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Agreement);
        assert_eq!(envelope.ciphertext.len(), b"Hello Bob!".len() + TAG_SIZE);
        assert!(envelope.verify_integrity());
        assert_eq!(open_as_bob(&envelope).unwrap(), b"Hello Bob!");
    }

    #[test]
    fn test_empty_plaintext() {
        let envelope = seal_for_bob(b"");
        assert_eq!(envelope.ciphertext.len(), TAG_SIZE);
        assert_eq!(open_as_bob(&envelope).unwrap(), b"");
    }

    #[test]
    fn test_each_seal_uses_fresh_material() {
        let a = seal_for_bob(b"same text");
        let b = seal_for_bob(b"same text");

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.wrapped_key, b.wrapped_key);
    }

    #[test]
    fn test_integrity_hash_is_over_base64_text() {
        let envelope = seal_for_bob(b"hash me");
        let expected = content_hash(to_base64(&envelope.ciphertext).as_bytes());
        assert_eq!(envelope.integrity_hash, expected);
        assert_eq!(envelope.integrity_hash.len(), 64);
    }

    #[test]
    fn test_sender_can_reopen_agreement_envelope() {
        // ECDH is symmetric, so the sender derives the same KEK
        let envelope = seal_for_bob(b"sent item");
        let reopened = envelope.open(alice(), Some(&bob().agreement.export_public()));
        assert_eq!(reopened.unwrap(), b"sent item");
    }

    #[test]
    fn test_wrong_recipient_cannot_open() {
        let envelope = seal_for_bob(b"for bob only");
        let result = envelope.open(mallory(), Some(&alice().agreement.export_public()));
        assert!(result.unwrap_err().is_decryption_failure());
    }

    #[test]
    fn test_missing_sender_key_for_agreement() {
        let envelope = seal_for_bob(b"needs sender key");
        assert!(matches!(envelope.open(bob(), None), Err(Error::Unwrap(_))));
    }

    #[test]
    fn test_fallback_when_agreement_key_malformed() {
        let mut broken = bob().agreement.export_public();
        broken.x = Some(to_base64url(&[0xFFu8; 32]));
        let envelope =
            MessageEnvelope::seal(b"fallback", &alice().agreement, &bob_with(Some(&broken))).unwrap();

        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Encapsulation);
        assert_eq!(envelope.wrapped_key.len(), 512);
        // Receiver needs no sender key on this path
        assert_eq!(envelope.open(bob(), None).unwrap(), b"fallback");
    }

    #[test]
    fn test_fallback_when_agreement_key_absent() {
        let envelope = MessageEnvelope::seal(b"no p256", &alice().agreement, &bob_with(None)).unwrap();

        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Encapsulation);
        assert_eq!(envelope.open(bob(), None).unwrap(), b"no p256");
    }

    #[test]
    fn test_encapsulation_key_only_needed_for_fallback() {
        let agreement = bob().agreement.export_public();
        let recipient = Recipient {
            agreement: Some(&agreement),
            encapsulation: None,
        };
        let envelope = MessageEnvelope::seal(b"agreement only", &alice().agreement, &recipient).unwrap();
        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Agreement);
        assert_eq!(open_as_bob(&envelope).unwrap(), b"agreement only");

        let neither = Recipient {
            agreement: None,
            encapsulation: None,
        };
        assert!(matches!(
            MessageEnvelope::seal(b"nowhere to go", &alice().agreement, &neither),
            Err(Error::KeyFormat(_))
        ));
    }

    #[test]
    fn test_fallback_when_agreement_key_wrong_type() {
        let rsa_as_agreement = bob().encapsulation.export_public();
        assert_eq!(rsa_as_agreement.kty, KTY_RSA);
        let recipient = bob_with(Some(&rsa_as_agreement));

        let envelope = MessageEnvelope::seal(b"mismatch", &alice().agreement, &recipient).unwrap();
        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Encapsulation);
    }

    #[test]
    fn test_dispatch_follows_tag() {
        // An agreement-wrapped key relabelled as encapsulation must not open
        let mut envelope = seal_for_bob(b"relabelled");
        envelope.wrap_algorithm = WrapAlgorithm::Encapsulation;
        assert!(matches!(open_as_bob(&envelope), Err(Error::Unwrap(_))));
    }

    #[test]
    fn test_payload_too_large() {
        let agreement = bob().agreement.export_public();
        let recipient = bob_with(Some(&agreement));

        let body = vec![b'a'; DEFAULT_MAX_MESSAGE_SIZE + 1];
        let result = MessageEnvelope::seal(&body, &alice().agreement, &recipient);
        assert!(matches!(result, Err(Error::PayloadTooLarge { .. })));

        let result = MessageEnvelope::seal_with_limit(b"12345", &alice().agreement, &recipient, 4);
        assert!(matches!(result, Err(Error::PayloadTooLarge { size: 5, max: 4 })));
    }

    #[test]
    fn test_tampered_hash_still_decryptable() {
        let mut envelope = seal_for_bob(b"hash tampered");
        envelope.integrity_hash = content_hash(b"something else");

        let report = envelope.open_report(bob(), Some(&alice().agreement.export_public()));
        assert!(!report.integrity_ok);
        assert!(report.decryptable());

        assert!(matches!(
            open_as_bob(&envelope),
            Err(Error::IntegrityMismatch { decryptable: true })
        ));
    }

    #[test]
    fn test_tampered_ciphertext_reports_both_failures() {
        let mut envelope = seal_for_bob(b"ciphertext tampered");
        envelope.ciphertext[0] ^= 0x80;

        let report = envelope.open_report(bob(), Some(&alice().agreement.export_public()));
        assert!(!report.integrity_ok);
        assert!(matches!(report.decryption, Err(Error::Decryption(_))));

        assert!(matches!(
            open_as_bob(&envelope),
            Err(Error::IntegrityMismatch { decryptable: false })
        ));
    }

    #[test]
    fn test_recomputed_hash_does_not_hide_tampering() {
        // An attacker who fixes up the hash still fails the AEAD tag
        let mut envelope = seal_for_bob(b"fixed up");
        envelope.ciphertext[2] ^= 0x01;
        envelope.integrity_hash = integrity_hash(&envelope.ciphertext);

        assert!(envelope.verify_integrity());
        assert!(matches!(open_as_bob(&envelope), Err(Error::Decryption(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let envelope = seal_for_bob(b"over the wire");
        let json = envelope.to_json().unwrap();

        assert!(json.contains("\"wrap_algorithm\":\"agreement\""));
        assert!(!json.contains("\"file\""));

        let decoded = MessageEnvelope::from_json(&json).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(open_as_bob(&decoded).unwrap(), b"over the wire");
    }

    #[test]
    fn test_json_rejects_unknown_algorithm() {
        let json = seal_for_bob(b"x")
            .to_json()
            .unwrap()
            .replace("\"agreement\"", "\"rot13\"");
        assert!(matches!(
            MessageEnvelope::from_json(&json),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_json_rejects_wrong_nonce_length() {
        let envelope = seal_for_bob(b"x");
        let mut value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        value["nonce"] = serde_json::Value::String(to_base64(&[0u8; 8]));

        assert!(matches!(
            MessageEnvelope::from_json(&value.to_string()),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_json_rejects_bad_base64_and_truncation() {
        let envelope = seal_for_bob(b"x");
        let mut value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        value["ciphertext"] = serde_json::Value::String("***".into());
        assert!(MessageEnvelope::from_json(&value.to_string()).is_err());

        value["ciphertext"] = serde_json::Value::String(to_base64(&[1u8; 4]));
        assert!(matches!(
            MessageEnvelope::from_json(&value.to_string()),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Flipping any single ciphertext bit is always caught
        #[test]
        fn property_ciphertext_bit_flip_detected(index in any::<prop::sample::Index>()) {
            // Body and GCM tag
            let mut envelope = seal_for_bob(b"property test payload");
            let bit = index.index(envelope.ciphertext.len() * 8);
            envelope.ciphertext[bit / 8] ^= 1 << (bit % 8);

            let result = open_as_bob(&envelope);
            prop_assert!(
                matches!(result, Err(Error::IntegrityMismatch { decryptable: false })),
                "unexpected result: {:?}",
                result.map(|pt| pt.len())
            );
        }

        /// Flipping any single nonce bit fails decryption
        #[test]
        fn property_nonce_bit_flip_detected(bit in 0usize..(NONCE_SIZE * 8)) {
            let mut envelope = seal_for_bob(b"nonce tamper");
            envelope.nonce[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(envelope.verify_integrity());
            prop_assert!(matches!(open_as_bob(&envelope), Err(Error::Decryption(_))));
        }

        /// Flipping any single wrapped-key bit fails the unwrap
        #[test]
        fn property_wrapped_key_bit_flip_detected(bit in 0usize..(48 * 8)) {
            let mut envelope = seal_for_bob(b"wrapped key tamper");
            envelope.wrapped_key[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(matches!(open_as_bob(&envelope), Err(Error::Unwrap(_))));
        }

        /// Flipping any single bit of an OAEP-wrapped key fails the unwrap
        #[test]
        fn property_encapsulated_key_bit_flip_detected(index in any::<prop::sample::Index>()) {
            let mut envelope =
                MessageEnvelope::seal(b"oaep tamper", &alice().agreement, &bob_with(None)).unwrap();
            prop_assert_eq!(envelope.wrapped_key.len(), 512);

            let bit = index.index(envelope.wrapped_key.len() * 8);
            envelope.wrapped_key[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(matches!(envelope.open(bob(), None), Err(Error::Unwrap(_))));
        }

        /// Flipping any single salt bit changes the KEK and the wrap nonce
        #[test]
        fn property_salt_bit_flip_detected(bit in 0usize..(SALT_SIZE * 8)) {
            let mut envelope = seal_for_bob(b"salt tamper");
            envelope.salt[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(matches!(open_as_bob(&envelope), Err(Error::Unwrap(_))));
        }
    }
}
