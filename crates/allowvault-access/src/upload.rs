//! Encrypted upload.
//!
//! Files are encrypted under a full id made of the policy object id and a
//! random nonce, then stored in the blob network. The resulting blob id is
//! what gets published to an allowlist.

use std::sync::Arc;

use bytes::Bytes;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use allowvault_core::{BlobId, FullId, ObjectId};
use allowvault_store::{BlobStatus, ObjectStore};

use crate::error::{AccessError, Result};
use crate::keys::KeyService;

/// Configuration for uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted plaintext, in bytes.
    pub max_file_size: usize,
    /// Storage epochs to pay for.
    pub epochs: u32,
    /// Key-server responses required to decrypt.
    pub threshold: u8,
    /// Random bytes appended to the policy id.
    pub nonce_len: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            epochs: 1,
            threshold: 2,
            nonce_len: 5,
        }
    }
}

/// Outcome of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedBlob {
    pub blob_id: BlobId,
    /// Identity the file was encrypted under.
    pub full_id: FullId,
    pub end_epoch: u64,
    pub status: BlobStatus,
}

impl UploadedBlob {
    pub fn is_newly_created(&self) -> bool {
        matches!(self.status, BlobStatus::NewlyCreated { .. })
    }
}

/// Encrypts files for a package and stores them.
pub struct Uploader<S: ObjectStore, K: KeyService> {
    store: Arc<S>,
    keys: Arc<K>,
    package_id: ObjectId,
    config: UploadConfig,
}

impl<S: ObjectStore, K: KeyService> Uploader<S, K> {
    pub fn new(store: Arc<S>, keys: Arc<K>, package_id: ObjectId, config: UploadConfig) -> Self {
        Self {
            store,
            keys,
            package_id,
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Encrypt `data` for the policy `policy_id` and store it.
    pub async fn encrypt_and_upload(
        &self,
        policy_id: &ObjectId,
        data: &[u8],
    ) -> Result<UploadedBlob> {
        if data.len() > self.config.max_file_size {
            return Err(AccessError::FileTooLarge {
                size: data.len(),
                max: self.config.max_file_size,
            });
        }

        let mut nonce = vec![0u8; self.config.nonce_len];
        rand::thread_rng().fill_bytes(&mut nonce);
        let full_id = FullId::for_policy(policy_id, &nonce);

        let envelope = self
            .keys
            .encrypt(&self.package_id, &full_id, self.config.threshold, data)
            .await
            .map_err(|e| AccessError::EncryptionFailed(e.to_string()))?;

        let stored = self
            .store
            .put(Bytes::from(envelope), self.config.epochs)
            .await?;

        tracing::info!(
            blob_id = %stored.blob_id,
            id = %full_id,
            bytes = data.len(),
            end_epoch = stored.end_epoch,
            "encrypted file uploaded"
        );

        Ok(UploadedBlob {
            blob_id: stored.blob_id,
            full_id,
            end_epoch: stored.end_epoch,
            status: stored.status,
        })
    }
}
