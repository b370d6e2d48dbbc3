//! Message store: envelopes in their wire form, grouped by chat.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One stored message row
///
/// The relay keeps the envelope as the JSON text it received. It never
/// parses it, so a malformed row only affects that row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
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
    /// Envelope wire form
    pub envelope: String,
}

/// Append-only store of message rows
pub trait MessageStore: Send + Sync {
    /// Store a row
    fn append(&self, message: StoredMessage) -> Result<()>;

    /// All rows of a chat, oldest first
    fn list(&self, chat_id: &str) -> Result<Vec<StoredMessage>>;
}

/// In-memory [`MessageStore`]
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    chats: RwLock<HashMap<String, Vec<StoredMessage>>>,
}

impl MemoryMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryMessageStore {
    fn append(&self, message: StoredMessage) -> Result<()> {
        let mut chats = self.chats.write();
        let rows = chats.entry(message.chat_id.clone()).or_default();
        rows.push(message);
        // Stable, so equal timestamps keep insertion order
        rows.sort_by_key(|row| row.timestamp);
        Ok(())
    }

    fn list(&self, chat_id: &str) -> Result<Vec<StoredMessage>> {
        Ok(self.chats.read().get(chat_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(chat: &str, ts: i64, body: &str) -> StoredMessage {
        StoredMessage {
            id: format!("{}-{}", chat, ts),
            chat_id: chat.into(),
            sender_id: "alice".into(),
            recipient_id: "bob".into(),
            timestamp: ts,
            envelope: body.into(),
        }
    }

    #[test]
    fn test_list_is_per_chat_and_ordered() {
        let store = MemoryMessageStore::new();
        store.append(row("c1", 20, "second")).unwrap();
        store.append(row("c2", 5, "other chat")).unwrap();
        store.append(row("c1", 10, "first")).unwrap();

        let rows = store.list("c1").unwrap();
        let bodies: Vec<_> = rows.iter().map(|r| r.envelope.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);

        assert!(store.list("missing").unwrap().is_empty());
    }

    #[test]
    fn test_rows_round_trip_unmodified() {
        let store = MemoryMessageStore::new();
        let original = row("c1", 1, r#"{"not":"parsed"}"#);
        store.append(original.clone()).unwrap();

        assert_eq!(store.list("c1").unwrap(), vec![original]);
    }
}
