//! Store traits: the abstract interfaces for session caching and blob storage.
//!
//! These traits keep the access pipeline storage-agnostic. Implementations
//! include SQLite and HTTP (primary) and in-memory (for tests).

use async_trait::async_trait;
use bytes::Bytes;

use allowvault_core::{BlobId, ObjectId};

use crate::error::Result;

/// The fixed cache slot holding the current decryption session.
pub const SESSION_SLOT: &str = "sessionKey";

/// How the blob network accepted an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStatus {
    /// The blob was stored for the first time.
    NewlyCreated {
        /// Ledger object that records the blob's storage.
        object_id: ObjectId,
    },
    /// Identical bytes were already stored and certified.
    AlreadyCertified {
        /// Transaction that certified the earlier upload.
        tx_digest: String,
    },
}

/// Result of uploading a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Handle for later retrieval.
    pub blob_id: BlobId,
    /// Last epoch the blob is guaranteed to be stored.
    pub end_epoch: u64,
    /// Whether this upload created the blob.
    pub status: BlobStatus,
}

/// A set of named slots holding opaque serialized bytes.
///
/// Only one slot ([`SESSION_SLOT`]) is used today. Concurrent writers to the
/// same slot are not coordinated; last write wins.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Read the bytes stored in a slot, if any.
    async fn load(&self, slot: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite a slot.
    async fn store(&self, slot: &str, payload: &[u8]) -> Result<()>;

    /// Empty a slot. Clearing an empty slot is not an error.
    async fn clear(&self, slot: &str) -> Result<()>;
}

/// The blob network holding encrypted files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a blob.
    ///
    /// Returns `Ok(None)` when the network does not have the blob (or no
    /// longer has it). Timeouts are enforced by the caller.
    async fn get(&self, blob_id: &BlobId) -> Result<Option<Bytes>>;

    /// Store a blob for the given number of epochs.
    async fn put(&self, data: Bytes, epochs: u32) -> Result<StoredBlob>;
}
