//! # Courier
//!
//! Send and read coordinator sitting between loaded identities and the
//! relay collaborators.
//!
//! ## Send Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SEND                                          │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  KeyRing ──► sender keys        IdentityDirectory ──► recipient record │
//! │                  │                                          │           │
//! │                  └──────────────┬───────────────────────────┘           │
//! │                                 ▼                                       │
//! │                   MessageEnvelope::seal(text)                          │
//! │                                 │                                       │
//! │            file? ──► SealedFile::seal(bytes)                           │
//! │                                 │                                       │
//! │              ┌──────────────────┴──────────────────┐                   │
//! │              ▼                                     ▼                   │
//! │     BlobStore::put ok                     upload failed / no store     │
//! │     payload = Referenced                  ciphertext < inline limit?   │
//! │                                           yes: payload = Inline        │
//! │                                           no:  Storage error           │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │                   MessageStore::append(row)                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reading
//!
//! Every row is opened independently. A row that fails to parse, unwrap,
//! decrypt or verify becomes [`MessageOutcome::Unreadable`] and the rest of
//! the chat is still returned.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backup::SealedBackup;
use crate::config::CoreConfig;
use crate::crypto::{digests_match, EncapsulationPublicKey, IdentityKeys, PortableKey};
use crate::envelope::{FileEnvelope, MessageEnvelope, Recipient, SealedFile};
use crate::error::{Error, Result};
use crate::keyring::KeyRing;
use crate::relay::{
    verify_fingerprint, BlobStore, IdentityDirectory, MessageStore, PublicIdentityRecord,
    StoredMessage,
};
use crate::time::now_timestamp_millis;

/// What reading one stored message produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// The body opened and verified
    Decrypted {
        /// Message text
        text: String,
        /// Attached file, still sealed; open it with [`Courier::fetch_file`]
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<FileEnvelope>,
    },
    /// Placeholder for a message that could not be opened
    Unreadable {
        /// Why opening failed
        reason: String,
    },
}

impl MessageOutcome {
    /// The text, if the message was readable
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Decrypted { text, .. } => Some(text.as_str()),
            Self::Unreadable { .. } => None,
        }
    }

    /// Whether this is a placeholder
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }
}

/// A stored message as seen by one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Row identifier
    pub id: String,
    /// Chat the message belongs to
    pub chat_id: String,
    /// Sending user
    pub sender_id: String,
    /// Receiving user
    pub recipient_id: String,
    /// Send time (Unix ms)
    pub timestamp: i64,
    /// Decrypted content or placeholder
    pub outcome: MessageOutcome,
}

impl ChatMessage {
    /// Whether `user_id` sent this message
    pub fn is_outgoing(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Coordinates sealing, storage and opening of messages
pub struct Courier {
    keyring: KeyRing,
    directory: Arc<dyn IdentityDirectory>,
    messages: Arc<dyn MessageStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    config: CoreConfig,
}

impl Courier {
    /// Create a courier; the configuration is validated first
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        messages: Arc<dyn MessageStore>,
        blobs: Option<Arc<dyn BlobStore>>,
        config: CoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keyring: KeyRing::new(),
            directory,
            messages,
            blobs,
            config,
        })
    }

    /// The loaded identities
    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    /// The active configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// Load `keys` for `user_id` and publish their public record
    pub fn register(
        &self,
        user_id: &str,
        display_name: Option<String>,
        keys: IdentityKeys,
    ) -> Result<PublicIdentityRecord> {
        let record = keys.public_record(user_id, display_name)?;
        self.directory.publish(record.clone())?;
        self.keyring.insert(user_id, keys);

        tracing::info!("Registered identity {} ({})", user_id, record.fingerprint);
        Ok(record)
    }

    /// Change the caller's own display name
    pub fn set_display_name(&self, user_id: &str, name: Option<String>) -> Result<()> {
        self.directory.set_display_name(user_id, user_id, name)
    }

    /// Restore keys from a backup and load them
    ///
    /// The restored keys must match the fingerprint already published for
    /// `user_id`; otherwise nothing is loaded.
    pub fn restore_identity(
        &self,
        user_id: &str,
        backup: &SealedBackup,
        passphrase: &str,
    ) -> Result<Arc<IdentityKeys>> {
        let record = self.require_record(user_id)?;
        if !verify_fingerprint(&record)? {
            return Err(Error::KeyFormat(format!(
                "published record for {} has an inconsistent fingerprint",
                user_id
            )));
        }

        let keys = backup.restore(passphrase)?;
        if !digests_match(&keys.fingerprint()?, &record.fingerprint) {
            return Err(Error::KeyFormat(format!(
                "restored keys do not match the published identity of {}",
                user_id
            )));
        }

        Ok(self.keyring.insert(user_id, keys))
    }

    // ========================================================================
    // SEND
    // ========================================================================

    /// Seal `text` (and optionally a file) for `recipient_id` and store it
    pub fn send(
        &self,
        chat_id: &str,
        sender_id: &str,
        recipient_id: &str,
        text: &str,
        file: Option<&[u8]>,
    ) -> Result<StoredMessage> {
        let sender = self.keyring.require(sender_id)?;
        let record = self.require_record(recipient_id)?;
        // A bad encapsulation key only matters if the agreement wrap fails
        let encapsulation = match EncapsulationPublicKey::from_portable(&record.encapsulation_public_key) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("Encapsulation key of {} is unusable: {}", recipient_id, e);
                None
            }
        };
        let recipient = Recipient {
            agreement: Some(&record.agreement_public_key),
            encapsulation: encapsulation.as_ref(),
        };

        let mut envelope = MessageEnvelope::seal_with_limit(
            text.as_bytes(),
            &sender.agreement,
            &recipient,
            self.config.max_message_size,
        )?;

        if let Some(bytes) = file {
            let sealed = SealedFile::seal(bytes, &sender.agreement, &recipient)?;
            envelope = envelope.with_file(self.place_file(sealed)?);
        }

        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            timestamp: now_timestamp_millis(),
            envelope: envelope.to_json()?,
        };
        self.messages.append(stored.clone())?;

        tracing::debug!(
            "Stored message {} in chat {} ({})",
            stored.id,
            chat_id,
            envelope.wrap_algorithm
        );
        Ok(stored)
    }

    fn place_file(&self, sealed: SealedFile) -> Result<FileEnvelope> {
        let upload = match &self.blobs {
            Some(blobs) => blobs.put(sealed.ciphertext().to_vec()),
            None => Err(Error::Storage("no blob store configured".into())),
        };

        match upload {
            Ok(reference) => Ok(sealed.into_referenced(reference)),
            Err(e) if sealed.ciphertext().len() < self.config.inline_file_limit => {
                tracing::warn!("File upload failed ({}), carrying ciphertext inline", e);
                Ok(sealed.into_inline())
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // READ
    // ========================================================================

    /// Open every message of a chat as `me`
    ///
    /// Only a missing identity or a store failure fails the whole call.
    pub fn read_chat(&self, chat_id: &str, me: &str) -> Result<Vec<ChatMessage>> {
        let own = self.keyring.require(me)?;
        let rows = self.messages.list(chat_id)?;

        Ok(rows.iter().map(|row| self.open_row(row, &own, me)).collect())
    }

    /// Open a single message delivered outside of [`Courier::read_chat`]
    pub fn open_delivery(&self, stored: &StoredMessage, me: &str) -> Result<ChatMessage> {
        let own = self.keyring.require(me)?;
        Ok(self.open_row(stored, &own, me))
    }

    /// Retrieve and open an attached file
    ///
    /// `peer_id` is the other participant of the message the file came with.
    pub fn fetch_file(&self, file: &FileEnvelope, me: &str, peer_id: &str) -> Result<Vec<u8>> {
        let own = self.keyring.require(me)?;
        let peer = self.directory.lookup(peer_id)?;

        let fetched = match file.reference() {
            Some(reference) => {
                let blobs = self
                    .blobs
                    .as_ref()
                    .ok_or_else(|| Error::Storage("no blob store configured".into()))?;
                Some(blobs.get(reference)?)
            }
            None => None,
        };

        file.open(&own, agreement_key(peer.as_ref()), fetched.as_deref())
    }

    fn open_row(&self, row: &StoredMessage, own: &IdentityKeys, me: &str) -> ChatMessage {
        let outcome = match self.try_open(row, own, me) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Message {} in chat {} is unreadable: {}", row.id, row.chat_id, e);
                MessageOutcome::Unreadable {
                    reason: e.to_string(),
                }
            }
        };

        ChatMessage {
            id: row.id.clone(),
            chat_id: row.chat_id.clone(),
            sender_id: row.sender_id.clone(),
            recipient_id: row.recipient_id.clone(),
            timestamp: row.timestamp,
            outcome,
        }
    }

    fn try_open(&self, row: &StoredMessage, own: &IdentityKeys, me: &str) -> Result<MessageOutcome> {
        // ECDH is symmetric, so our own sent messages open against the
        // recipient's agreement key
        let peer_id = if row.sender_id == me {
            &row.recipient_id
        } else if row.recipient_id == me {
            &row.sender_id
        } else {
            return Err(Error::Unwrap(format!("{} is not a participant", me)));
        };

        let envelope = MessageEnvelope::from_json(&row.envelope)?;
        let peer = self.directory.lookup(peer_id)?;
        let plaintext = envelope.open(own, agreement_key(peer.as_ref()))?;
        let text = String::from_utf8(plaintext)
            .map_err(|_| Error::Deserialization("message body is not UTF-8".into()))?;

        Ok(MessageOutcome::Decrypted {
            text,
            file: envelope.file,
        })
    }

    fn require_record(&self, user_id: &str) -> Result<PublicIdentityRecord> {
        self.directory
            .lookup(user_id)?
            .ok_or_else(|| Error::IdentityNotFound(user_id.to_string()))
    }
}

fn agreement_key(record: Option<&PublicIdentityRecord>) -> Option<&PortableKey> {
    record.map(|r| &r.agreement_public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::MIN_BACKUP_ITERATIONS;
    use crate::crypto::WrapAlgorithm;
    use crate::envelope::FilePayload;
    use crate::relay::{MemoryBlobStore, MemoryDirectory, MemoryMessageStore};
    use crate::test_support::{alice, bob, mallory};

    struct Harness {
        courier: Courier,
        directory: Arc<MemoryDirectory>,
        messages: Arc<MemoryMessageStore>,
        blobs: Arc<MemoryBlobStore>,
    }

    fn copy_of(keys: &IdentityKeys) -> IdentityKeys {
        IdentityKeys::from_bundle(&keys.to_bundle()).unwrap()
    }

    fn harness_with(config: CoreConfig) -> Harness {
        let directory = Arc::new(MemoryDirectory::new());
        let messages = Arc::new(MemoryMessageStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let courier = Courier::new(
            directory.clone(),
            messages.clone(),
            Some(blobs.clone()),
            config,
        )
        .unwrap();

        courier.register("alice", Some("Alice".into()), copy_of(alice())).unwrap();
        courier.register("bob", None, copy_of(bob())).unwrap();

        Harness {
            courier,
            directory,
            messages,
            blobs,
        }
    }

    fn harness() -> Harness {
        harness_with(CoreConfig::default())
    }

    #[test]
    fn test_new_validates_config() {
        let config = CoreConfig {
            backup_iterations: 10,
            ..CoreConfig::default()
        };
        let result = Courier::new(
            Arc::new(MemoryDirectory::new()),
            Arc::new(MemoryMessageStore::new()),
            None,
            config,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_register_publishes_verifiable_record() {
        let h = harness();
        let record = h.directory.lookup("alice").unwrap().unwrap();

        assert_eq!(record.display_name.as_deref(), Some("Alice"));
        assert_eq!(record.fingerprint, alice().fingerprint().unwrap());
        assert!(verify_fingerprint(&record).unwrap());
        assert!(h.courier.keyring().contains("alice"));
    }

    #[test]
    fn test_send_and_read_both_sides() {
        let h = harness();
        h.courier.send("chat", "alice", "bob", "hi bob", None).unwrap();
        h.courier.send("chat", "bob", "alice", "hi alice", None).unwrap();

        let bob_view = h.courier.read_chat("chat", "bob").unwrap();
        let texts: Vec<_> = bob_view.iter().map(|m| m.outcome.text()).collect();
        assert_eq!(texts, vec![Some("hi bob"), Some("hi alice")]);
        assert!(!bob_view[0].is_outgoing("bob"));

        let alice_view = h.courier.read_chat("chat", "alice").unwrap();
        assert_eq!(alice_view[0].outcome.text(), Some("hi bob"));
        assert!(alice_view[0].is_outgoing("alice"));
    }

    #[test]
    fn test_stored_row_holds_only_ciphertext() {
        let h = harness();
        let stored = h
            .courier
            .send("chat", "alice", "bob", "a very secret sentence", None)
            .unwrap();

        assert!(!stored.envelope.contains("secret"));
        let envelope = MessageEnvelope::from_json(&stored.envelope).unwrap();
        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Agreement);
    }

    #[test]
    fn test_send_requires_identities() {
        let h = harness();
        assert!(matches!(
            h.courier.send("chat", "carol", "bob", "x", None),
            Err(Error::NoIdentity(_))
        ));
        assert!(matches!(
            h.courier.send("chat", "alice", "carol", "x", None),
            Err(Error::IdentityNotFound(_))
        ));
        assert!(matches!(h.courier.read_chat("chat", "carol"), Err(Error::NoIdentity(_))));
    }

    #[test]
    fn test_message_size_limit() {
        let h = harness_with(CoreConfig {
            max_message_size: 8,
            ..CoreConfig::default()
        });
        assert!(matches!(
            h.courier.send("chat", "alice", "bob", "nine char", None),
            Err(Error::PayloadTooLarge { size: 9, max: 8 })
        ));
        assert!(h.messages.list("chat").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_agreement_key_falls_back() {
        let h = harness();
        let mut record = h.directory.lookup("bob").unwrap().unwrap();
        record.agreement_public_key.x = Some("not-a-coordinate".into());
        h.directory.publish(record).unwrap();

        let stored = h.courier.send("chat", "alice", "bob", "fallback", None).unwrap();
        let envelope = MessageEnvelope::from_json(&stored.envelope).unwrap();
        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Encapsulation);

        let bob_view = h.courier.read_chat("chat", "bob").unwrap();
        assert_eq!(bob_view[0].outcome.text(), Some("fallback"));

        // Encapsulation-wrapped keys are only recoverable by the recipient
        let alice_view = h.courier.read_chat("chat", "alice").unwrap();
        assert!(alice_view[0].outcome.is_unreadable());
    }

    #[test]
    fn test_malformed_encapsulation_key_does_not_block_agreement() {
        let h = harness();
        let mut record = h.directory.lookup("bob").unwrap().unwrap();
        record.encapsulation_public_key.n = Some("not-a-modulus".into());
        h.directory.publish(record).unwrap();

        let stored = h.courier.send("chat", "alice", "bob", "still fine", None).unwrap();
        let envelope = MessageEnvelope::from_json(&stored.envelope).unwrap();
        assert_eq!(envelope.wrap_algorithm, WrapAlgorithm::Agreement);

        let bob_view = h.courier.read_chat("chat", "bob").unwrap();
        assert_eq!(bob_view[0].outcome.text(), Some("still fine"));
    }

    #[test]
    fn test_no_usable_key_fails_send() {
        let h = harness();
        let mut record = h.directory.lookup("bob").unwrap().unwrap();
        record.agreement_public_key.x = Some("not-a-coordinate".into());
        record.encapsulation_public_key.n = Some("not-a-modulus".into());
        h.directory.publish(record).unwrap();

        assert!(matches!(
            h.courier.send("chat", "alice", "bob", "undeliverable", None),
            Err(Error::KeyFormat(_))
        ));
        assert!(h.messages.list("chat").unwrap().is_empty());
    }

    #[test]
    fn test_bad_rows_do_not_hide_good_ones() {
        let h = harness();
        h.courier.send("chat", "alice", "bob", "first", None).unwrap();
        let mut tampered = h.courier.send("chat", "alice", "bob", "second", None).unwrap();
        h.courier.send("chat", "alice", "bob", "third", None).unwrap();

        let mut envelope = MessageEnvelope::from_json(&tampered.envelope).unwrap();
        envelope.ciphertext[0] ^= 0x01;
        tampered.id = "tampered".into();
        tampered.envelope = envelope.to_json().unwrap();
        h.messages.append(tampered).unwrap();

        h.messages
            .append(StoredMessage {
                id: "garbage".into(),
                chat_id: "chat".into(),
                sender_id: "alice".into(),
                recipient_id: "bob".into(),
                timestamp: i64::MAX,
                envelope: "{\"nope\":true}".into(),
            })
            .unwrap();

        let view = h.courier.read_chat("chat", "bob").unwrap();
        assert_eq!(view.len(), 5);

        let readable: Vec<_> = view.iter().filter_map(|m| m.outcome.text()).collect();
        assert_eq!(readable, vec!["first", "second", "third"]);

        let unreadable: Vec<_> = view
            .iter()
            .filter(|m| m.outcome.is_unreadable())
            .map(|m| m.id.as_str())
            .collect();
        assert!(unreadable.contains(&"tampered"));
        assert!(unreadable.contains(&"garbage"));
    }

    #[test]
    fn test_outsider_sees_placeholders() {
        let h = harness();
        h.courier.register("mallory", None, copy_of(mallory())).unwrap();
        h.courier.send("chat", "alice", "bob", "private", None).unwrap();

        let view = h.courier.read_chat("chat", "mallory").unwrap();
        assert!(view[0].outcome.is_unreadable());
    }

    #[test]
    fn test_open_delivery_matches_read() {
        let h = harness();
        let stored = h.courier.send("chat", "alice", "bob", "pushed", None).unwrap();

        let delivered = h.courier.open_delivery(&stored, "bob").unwrap();
        assert_eq!(delivered.outcome.text(), Some("pushed"));
        assert_eq!(delivered, h.courier.read_chat("chat", "bob").unwrap()[0]);
    }

    #[test]
    fn test_file_goes_to_blob_store() {
        let h = harness();
        let bytes = vec![7u8; 4096];
        h.courier.send("chat", "alice", "bob", "see file", Some(bytes.as_slice())).unwrap();
        assert_eq!(h.blobs.len(), 1);

        let view = h.courier.read_chat("chat", "bob").unwrap();
        let file = match &view[0].outcome {
            MessageOutcome::Decrypted { file: Some(file), .. } => file.clone(),
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(file.reference().is_some());

        assert_eq!(h.courier.fetch_file(&file, "bob", "alice").unwrap(), bytes);
        assert_eq!(h.courier.fetch_file(&file, "alice", "bob").unwrap(), bytes);
    }

    #[test]
    fn test_failed_upload_falls_back_to_inline() {
        let h = harness();
        h.blobs.set_online(false);

        let bytes = b"small attachment".to_vec();
        let stored = h
            .courier
            .send("chat", "alice", "bob", "inline", Some(bytes.as_slice()))
            .unwrap();
        let envelope = MessageEnvelope::from_json(&stored.envelope).unwrap();
        let file = envelope.file.unwrap();
        assert!(matches!(file.payload, FilePayload::Inline(_)));

        assert_eq!(h.courier.fetch_file(&file, "bob", "alice").unwrap(), bytes);
    }

    #[test]
    fn test_failed_upload_over_inline_limit() {
        let h = harness_with(CoreConfig {
            inline_file_limit: 32,
            ..CoreConfig::default()
        });
        h.blobs.set_online(false);

        let result = h.courier.send("chat", "alice", "bob", "big", Some([0u8; 64].as_slice()));
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(h.messages.list("chat").unwrap().is_empty());
    }

    #[test]
    fn test_missing_blob() {
        let h = harness();
        let stored = h
            .courier
            .send("chat", "alice", "bob", "file", Some(b"payload".as_slice()))
            .unwrap();
        let mut file = MessageEnvelope::from_json(&stored.envelope).unwrap().file.unwrap();
        file.payload = FilePayload::Referenced("blob:gone".into());

        assert!(matches!(
            h.courier.fetch_file(&file, "bob", "alice"),
            Err(Error::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_restore_identity_checks_fingerprint() {
        let h = harness();
        let bundle = alice().to_bundle();
        let backup = SealedBackup::seal_with_iterations(&bundle, "pass", MIN_BACKUP_ITERATIONS).unwrap();

        h.courier.keyring().remove("alice");
        assert!(matches!(
            h.courier.restore_identity("bob", &backup, "pass"),
            Err(Error::KeyFormat(_))
        ));

        h.courier.restore_identity("alice", &backup, "pass").unwrap();
        assert!(h.courier.keyring().contains("alice"));
    }

    #[test]
    fn test_set_display_name() {
        let h = harness();
        h.courier.set_display_name("bob", Some("Robert".into())).unwrap();
        let record = h.directory.lookup("bob").unwrap().unwrap();
        assert_eq!(record.display_name.as_deref(), Some("Robert"));
    }
}
