//! Blob store with injectable failures.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use allowvault_core::BlobId;
use allowvault_store::{MemoryObjectStore, ObjectStore, Result, StoreError, StoredBlob};

#[derive(Default)]
struct Faults {
    erroring: HashSet<BlobId>,
    delayed: HashMap<BlobId, Duration>,
    gets: usize,
}

/// A [`MemoryObjectStore`] whose reads can be delayed or made to fail.
#[derive(Default)]
pub struct FlakyObjectStore {
    inner: MemoryObjectStore,
    faults: Mutex<Faults>,
}

impl FlakyObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    /// Store bytes under a chosen id.
    pub fn insert(&self, blob_id: BlobId, data: impl Into<Bytes>) {
        self.inner.insert(blob_id, data);
    }

    /// Reads of `blob_id` fail with a server error.
    pub fn fail(&self, blob_id: BlobId) {
        self.faults.lock().unwrap().erroring.insert(blob_id);
    }

    /// Reads of `blob_id` take `delay` before answering.
    pub fn delay(&self, blob_id: BlobId, delay: Duration) {
        self.faults.lock().unwrap().delayed.insert(blob_id, delay);
    }

    /// Number of `get` calls so far.
    pub fn get_count(&self) -> usize {
        self.faults.lock().unwrap().gets
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn get(&self, blob_id: &BlobId) -> Result<Option<Bytes>> {
        let (erroring, delay) = {
            let mut faults = self.faults.lock().unwrap();
            faults.gets += 1;
            (
                faults.erroring.contains(blob_id),
                faults.delayed.get(blob_id).copied(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if erroring {
            return Err(StoreError::Status {
                status: 503,
                url: format!("memory://blobs/{}", blob_id),
            });
        }
        self.inner.get(blob_id).await
    }

    async fn put(&self, data: Bytes, epochs: u32) -> Result<StoredBlob> {
        self.inner.put(data, epochs).await
    }
}
