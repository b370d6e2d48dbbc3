//! Identity directory: published public keys per user.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{digests_match, fingerprint_portable, PortableKey};
use crate::error::{Error, Result};
use crate::time::now_timestamp_millis;

/// Public identity as published to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIdentityRecord {
    /// Account identifier
    pub user_id: String,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Agreement (P-256) public key
    pub agreement_public_key: PortableKey,
    /// Encapsulation (RSA-OAEP) public key
    pub encapsulation_public_key: PortableKey,
    /// Hex SHA-256 over both canonical public keys
    pub fingerprint: String,
    /// Creation time (Unix ms)
    pub created_at: i64,
    /// Last update time (Unix ms)
    pub updated_at: i64,
}

/// Recompute a record's fingerprint from its keys and compare
///
/// Returns `Ok(false)` for a record whose keys were swapped after the
/// fingerprint was computed; malformed keys are `KeyFormat`.
pub fn verify_fingerprint(record: &PublicIdentityRecord) -> Result<bool> {
    let computed = fingerprint_portable(
        &record.agreement_public_key,
        &record.encapsulation_public_key,
    )?;
    Ok(digests_match(&computed, &record.fingerprint))
}

/// Directory of published identities
pub trait IdentityDirectory: Send + Sync {
    /// Publish or replace the record for `record.user_id`
    fn publish(&self, record: PublicIdentityRecord) -> Result<()>;

    /// Look up a user's record
    fn lookup(&self, user_id: &str) -> Result<Option<PublicIdentityRecord>>;

    /// Change the display name; only the owner may do this
    fn set_display_name(&self, caller_id: &str, user_id: &str, name: Option<String>) -> Result<()>;
}

/// In-memory [`IdentityDirectory`]
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    records: RwLock<HashMap<String, PublicIdentityRecord>>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn publish(&self, mut record: PublicIdentityRecord) -> Result<()> {
        let mut records = self.records.write();
        if let Some(existing) = records.get(&record.user_id) {
            record.created_at = existing.created_at;
        }
        tracing::debug!("Published identity {}", record.user_id);
        records.insert(record.user_id.clone(), record);
        Ok(())
    }

    fn lookup(&self, user_id: &str) -> Result<Option<PublicIdentityRecord>> {
        Ok(self.records.read().get(user_id).cloned())
    }

    fn set_display_name(&self, caller_id: &str, user_id: &str, name: Option<String>) -> Result<()> {
        if caller_id != user_id {
            return Err(Error::Storage(format!(
                "{} may not modify the record of {}",
                caller_id, user_id
            )));
        }

        let mut records = self.records.write();
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| Error::IdentityNotFound(user_id.to_string()))?;
        record.display_name = name;
        record.updated_at = now_timestamp_millis().max(record.updated_at + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{alice, bob};

    #[test]
    fn test_publish_and_lookup() {
        let directory = MemoryDirectory::new();
        let record = alice().public_record("alice", None).unwrap();

        directory.publish(record.clone()).unwrap();

        assert_eq!(directory.lookup("alice").unwrap(), Some(record));
        assert_eq!(directory.lookup("nobody").unwrap(), None);
    }

    #[test]
    fn test_republish_keeps_created_at() {
        let directory = MemoryDirectory::new();
        let mut first = alice().public_record("alice", None).unwrap();
        first.created_at = 1;
        directory.publish(first).unwrap();

        directory.publish(alice().public_record("alice", None).unwrap()).unwrap();
        assert_eq!(directory.lookup("alice").unwrap().unwrap().created_at, 1);
    }

    #[test]
    fn test_owner_only_display_name() {
        let directory = MemoryDirectory::new();
        let record = alice().public_record("alice", None).unwrap();
        let before = record.updated_at;
        directory.publish(record).unwrap();

        assert!(directory
            .set_display_name("bob", "alice", Some("Mallory".into()))
            .is_err());

        directory
            .set_display_name("alice", "alice", Some("Alice".into()))
            .unwrap();
        let updated = directory.lookup("alice").unwrap().unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Alice"));
        assert!(updated.updated_at > before);

        assert!(matches!(
            directory.set_display_name("carol", "carol", None),
            Err(Error::IdentityNotFound(_))
        ));
    }

    #[test]
    fn test_verify_fingerprint() {
        let record = alice().public_record("alice", None).unwrap();
        assert!(verify_fingerprint(&record).unwrap());

        let mut swapped = record.clone();
        swapped.encapsulation_public_key = bob().encapsulation.export_public();
        assert!(!verify_fingerprint(&swapped).unwrap());

        let mut broken = record;
        broken.agreement_public_key.x = None;
        assert!(matches!(verify_fingerprint(&broken), Err(Error::KeyFormat(_))));
    }
}
