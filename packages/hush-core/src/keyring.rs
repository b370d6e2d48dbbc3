//! # Key Ring
//!
//! Session-scoped cache of loaded identities, keyed by user id.
//!
//! The envelope engine never looks keys up itself; callers fetch an
//! `Arc<IdentityKeys>` here and pass it in. Entries live until removed or
//! until the ring is dropped, at which point the private keys are zeroized.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backup::SealedBackup;
use crate::crypto::IdentityKeys;
use crate::error::{Error, Result};

/// In-memory cache of private identities
#[derive(Debug, Default)]
pub struct KeyRing {
    identities: RwLock<HashMap<String, Arc<IdentityKeys>>>,
}

impl KeyRing {
    /// Create an empty key ring
    pub fn new() -> Self {
        Self::default()
    }

    /// Load keys for `user_id`, replacing any previous entry
    pub fn insert(&self, user_id: impl Into<String>, keys: IdentityKeys) -> Arc<IdentityKeys> {
        let keys = Arc::new(keys);
        let user_id = user_id.into();
        tracing::debug!("Loaded identity for {}", user_id);
        self.identities.write().insert(user_id, keys.clone());
        keys
    }

    /// Keys for `user_id`, if loaded
    pub fn get(&self, user_id: &str) -> Option<Arc<IdentityKeys>> {
        self.identities.read().get(user_id).cloned()
    }

    /// Keys for `user_id`, or `NoIdentity`
    pub fn require(&self, user_id: &str) -> Result<Arc<IdentityKeys>> {
        self.get(user_id)
            .ok_or_else(|| Error::NoIdentity(user_id.to_string()))
    }

    /// Unload keys for `user_id`
    pub fn remove(&self, user_id: &str) -> Option<Arc<IdentityKeys>> {
        self.identities.write().remove(user_id)
    }

    /// Whether keys for `user_id` are loaded
    pub fn contains(&self, user_id: &str) -> bool {
        self.identities.read().contains_key(user_id)
    }

    /// Unseal a backup and load the restored keys
    ///
    /// On failure the ring is left unchanged.
    pub fn restore_from_backup(
        &self,
        user_id: impl Into<String>,
        backup: &SealedBackup,
        passphrase: &str,
    ) -> Result<Arc<IdentityKeys>> {
        let keys = backup.restore(passphrase)?;
        Ok(self.insert(user_id, keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::MIN_BACKUP_ITERATIONS;
    use crate::test_support::{alice, bob};

    fn copy_of(keys: &IdentityKeys) -> IdentityKeys {
        IdentityKeys::from_bundle(&keys.to_bundle()).unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let ring = KeyRing::new();
        assert!(ring.get("alice").is_none());
        assert!(matches!(ring.require("alice"), Err(Error::NoIdentity(_))));

        ring.insert("alice", copy_of(alice()));
        assert!(ring.contains("alice"));
        let loaded = ring.require("alice").unwrap();
        assert_eq!(loaded.public_keys(), alice().public_keys());

        let removed = ring.remove("alice").unwrap();
        assert!(Arc::ptr_eq(&removed, &loaded));
        assert!(!ring.contains("alice"));
    }

    #[test]
    fn test_insert_replaces() {
        let ring = KeyRing::new();
        ring.insert("user", copy_of(alice()));
        ring.insert("user", copy_of(bob()));

        assert_eq!(ring.require("user").unwrap().public_keys(), bob().public_keys());
    }

    #[test]
    fn test_restore_from_backup() {
        let backup = SealedBackup::seal_with_iterations(
            &alice().to_bundle(),
            "ring passphrase",
            MIN_BACKUP_ITERATIONS,
        )
        .unwrap();

        let ring = KeyRing::new();
        assert!(matches!(
            ring.restore_from_backup("alice", &backup, "wrong"),
            Err(Error::BackupRestore)
        ));
        assert!(!ring.contains("alice"));

        let restored = ring
            .restore_from_backup("alice", &backup, "ring passphrase")
            .unwrap();
        assert_eq!(restored.fingerprint().unwrap(), alice().fingerprint().unwrap());
        assert!(ring.contains("alice"));
    }
}
