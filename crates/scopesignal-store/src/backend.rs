//! Key-value backends the result cache can sit on.
//!
//! A backend only needs get/set/delete-by-key plus a listing; record
//! encoding, expiry, and corruption handling live in
//! [`ResultCache`](crate::ResultCache).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::StoreError;

/// One stored record as seen by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub size_bytes: u64,
}

/// Byte storage addressed by string keys.
///
/// Implementations must tolerate concurrent callers without external
/// locking. A reader may see the previous or the new value of a key being
/// overwritten, but never a partial write.
pub trait CacheBackend: Send + Sync {
    /// Read a record. `Ok(None)` when the key is absent.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a record, replacing any existing value.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Delete a record. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// List every stored record.
    fn entries(&self) -> Result<Vec<StoredEntry>, StoreError>;
}

/// Process-local backend for tests and cache-only-for-this-run usage.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.read().get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.records.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|(key, bytes)| StoredEntry {
                key: key.clone(),
                size_bytes: bytes.len() as u64,
            })
            .collect())
    }
}
