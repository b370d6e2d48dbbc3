//! Blob store for out-of-line file ciphertext.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque storage for encrypted file payloads
pub trait BlobStore: Send + Sync {
    /// Store bytes and return a reference to them
    fn put(&self, bytes: Vec<u8>) -> Result<String>;

    /// Fetch bytes by reference
    ///
    /// Returns `BlobNotFound` for an unknown reference.
    fn get(&self, reference: &str) -> Result<Vec<u8>>;
}

/// In-memory [`BlobStore`]
///
/// Can be switched offline to exercise upload failure handling.
#[derive(Debug)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    online: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl MemoryBlobStore {
    /// Create an empty, online store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls succeed or fail
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether no blobs are stored
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: Vec<u8>) -> Result<String> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Storage("blob store unavailable".into()));
        }
        let reference = format!("blob:{}", Uuid::new_v4());
        self.blobs.write().insert(reference.clone(), bytes);
        Ok(reference)
    }

    fn get(&self, reference: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let store = MemoryBlobStore::new();
        let reference = store.put(vec![1, 2, 3]).unwrap();

        assert!(reference.starts_with("blob:"));
        assert_eq!(store.get(&reference).unwrap(), vec![1, 2, 3]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_reference() {
        let store = MemoryBlobStore::new();
        let err = store.get("blob:missing").unwrap_err();
        assert!(matches!(err, Error::BlobNotFound(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_offline_put_fails() {
        let store = MemoryBlobStore::new();
        store.set_online(false);
        assert!(matches!(store.put(vec![0]), Err(Error::Storage(_))));
        assert!(store.is_empty());

        store.set_online(true);
        assert!(store.put(vec![0]).is_ok());
    }
}
