//! In-memory implementations of the store traits.
//!
//! These are primarily for testing. They have the same semantics as the
//! SQLite cache and the HTTP blob store but keep everything in memory.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use allowvault_core::{BlobId, ObjectId};

use crate::error::{Result, StoreError};
use crate::traits::{BlobStatus, ObjectStore, SessionCache, StoredBlob};

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StoreError {
    StoreError::InvalidData(format!("lock poisoned: {}", e))
}

/// In-memory session cache.
///
/// All data is lost when the cache is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemorySessionCache {
    slots: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySessionCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a slot currently holds a value.
    pub fn contains(&self, slot: &str) -> bool {
        self.slots
            .read()
            .map(|slots| slots.contains_key(slot))
            .unwrap_or(false)
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn load(&self, slot: &str) -> Result<Option<Vec<u8>>> {
        let slots = self.slots.read().map_err(poisoned)?;
        Ok(slots.get(slot).cloned())
    }

    async fn store(&self, slot: &str, payload: &[u8]) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        slots.insert(slot.to_string(), payload.to_vec());
        Ok(())
    }

    async fn clear(&self, slot: &str) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        slots.remove(slot);
        Ok(())
    }
}

/// In-memory blob store.
///
/// Blob ids are the hex Blake3 hash of the content, so storing identical
/// bytes twice reports [`BlobStatus::AlreadyCertified`].
pub struct MemoryObjectStore {
    inner: RwLock<MemoryObjectStoreInner>,
}

struct MemoryObjectStoreInner {
    blobs: HashMap<BlobId, StoredEntry>,
    current_epoch: u64,
}

struct StoredEntry {
    data: Bytes,
    end_epoch: u64,
}

impl MemoryObjectStore {
    /// Create a new empty store at epoch 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryObjectStoreInner {
                blobs: HashMap::new(),
                current_epoch: 1,
            }),
        }
    }

    /// Insert bytes under a caller-chosen blob id.
    pub fn insert(&self, blob_id: BlobId, data: impl Into<Bytes>) {
        if let Ok(mut inner) = self.inner.write() {
            let end_epoch = inner.current_epoch + 1;
            inner.blobs.insert(
                blob_id,
                StoredEntry {
                    data: data.into(),
                    end_epoch,
                },
            );
        }
    }

    /// Advance the epoch, dropping every blob whose storage has ended.
    pub fn advance_epoch(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.current_epoch += 1;
            let epoch = inner.current_epoch;
            inner.blobs.retain(|_, entry| entry.end_epoch > epoch);
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.blobs.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, blob_id: &BlobId) -> Result<Option<Bytes>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.blobs.get(blob_id).map(|entry| entry.data.clone()))
    }

    async fn put(&self, data: Bytes, epochs: u32) -> Result<StoredBlob> {
        let hash = blake3::hash(&data);
        let blob_id = BlobId::new(hash.to_hex().to_string())
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let mut inner = self.inner.write().map_err(poisoned)?;

        if let Some(existing) = inner.blobs.get(&blob_id) {
            return Ok(StoredBlob {
                blob_id,
                end_epoch: existing.end_epoch,
                status: BlobStatus::AlreadyCertified {
                    tx_digest: hash.to_hex()[..32].to_string(),
                },
            });
        }

        let end_epoch = inner.current_epoch + u64::from(epochs);
        inner.blobs.insert(
            blob_id.clone(),
            StoredEntry { data, end_epoch },
        );

        Ok(StoredBlob {
            blob_id,
            end_epoch,
            status: BlobStatus::NewlyCreated {
                object_id: ObjectId::from_bytes(*hash.as_bytes()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SESSION_SLOT;

    #[tokio::test]
    async fn test_session_cache_slots() {
        let cache = MemorySessionCache::new();
        assert_eq!(cache.load(SESSION_SLOT).await.unwrap(), None);

        cache.store(SESSION_SLOT, b"session-bytes").await.unwrap();
        assert_eq!(
            cache.load(SESSION_SLOT).await.unwrap().as_deref(),
            Some(&b"session-bytes"[..])
        );
        assert!(cache.contains(SESSION_SLOT));

        cache.clear(SESSION_SLOT).await.unwrap();
        assert_eq!(cache.load(SESSION_SLOT).await.unwrap(), None);

        // Clearing again is fine
        cache.clear(SESSION_SLOT).await.unwrap();
    }

    #[tokio::test]
    async fn test_object_store_put_get() {
        let store = MemoryObjectStore::new();
        let stored = store.put(Bytes::from_static(b"ciphertext"), 1).await.unwrap();

        assert!(matches!(stored.status, BlobStatus::NewlyCreated { .. }));
        assert_eq!(stored.end_epoch, 2);

        let data = store.get(&stored.blob_id).await.unwrap().unwrap();
        assert_eq!(&data[..], b"ciphertext");
    }

    #[tokio::test]
    async fn test_object_store_idempotent_put() {
        let store = MemoryObjectStore::new();
        let first = store.put(Bytes::from_static(b"same"), 1).await.unwrap();
        let second = store.put(Bytes::from_static(b"same"), 1).await.unwrap();

        assert_eq!(first.blob_id, second.blob_id);
        assert!(matches!(second.status, BlobStatus::AlreadyCertified { .. }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_object_store_expiry() {
        let store = MemoryObjectStore::new();
        let stored = store.put(Bytes::from_static(b"short-lived"), 1).await.unwrap();

        store.advance_epoch();
        assert!(store.get(&stored.blob_id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_blob_is_none() {
        let store = MemoryObjectStore::new();
        let id = BlobId::new("missing").unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }
}
