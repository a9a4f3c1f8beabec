//! Access-gated retrieval pipeline.
//!
//! Turns a list of blob ids into decrypted, classified, locally addressable
//! files. The work runs in phases:
//!
//! 1. Download every blob concurrently, each under its own timeout
//! 2. Keep what arrived; fail with `NoBlobsRetrievable` if nothing did
//! 3. Fetch keys in fixed-size batches, one approval transaction per batch
//! 4. Decrypt each ciphertext in order
//! 5. Classify, register, and name the results
//!
//! Phases 3 and 4 are all-or-nothing: the first failure aborts the whole
//! retrieval and no files are returned.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use allowvault_core::{classify, BlobId, FullId};
use allowvault_perms::{ApprovalCallBuilder, EncryptedObject, LedgerClient, Session};
use allowvault_store::ObjectStore;

use crate::download::download_all;
use crate::error::{AccessError, Result};
use crate::file::{DecryptedFile, FileRegistry};
use crate::keys::KeyService;

/// Configuration for retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Timeout for each blob download.
    pub download_timeout: Duration,
    /// Maximum ids per key request.
    pub key_batch_size: usize,
    /// Key-server responses required.
    pub threshold: u8,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            download_timeout: Duration::from_secs(10),
            key_batch_size: 10,
            threshold: 2,
        }
    }
}

/// Retrieves and decrypts blobs on behalf of a session.
///
/// Holds no per-call state: calling [`Self::retrieve_and_decrypt`] again
/// repeats all the work.
pub struct Retriever<L: LedgerClient, S: ObjectStore, K: KeyService> {
    ledger: Arc<L>,
    store: Arc<S>,
    keys: Arc<K>,
    registry: FileRegistry,
    config: RetrievalConfig,
    /// Generation counter, bumped once per non-empty retrieval.
    completion: watch::Sender<u64>,
}

impl<L: LedgerClient, S: ObjectStore, K: KeyService> Retriever<L, S, K> {
    /// Create a retriever with its own file registry.
    pub fn new(ledger: Arc<L>, store: Arc<S>, keys: Arc<K>, config: RetrievalConfig) -> Self {
        let (completion, _) = watch::channel(0);
        Self {
            ledger,
            store,
            keys,
            registry: FileRegistry::new(),
            config,
            completion,
        }
    }

    /// Register decrypted files in a shared registry instead.
    pub fn with_registry(mut self, registry: FileRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Watch for completed retrievals.
    ///
    /// The value increases by one each time a retrieval returns at least one
    /// file.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.completion.subscribe()
    }

    /// Download, authorize, and decrypt `blob_ids`.
    ///
    /// Blobs that cannot be downloaded are skipped. Files are named
    /// `decrypted-{n}.{ext}` by their position among the blobs that arrived.
    ///
    /// # Errors
    ///
    /// - [`AccessError::NoBlobsRetrievable`] if no blob arrived (including
    ///   when `blob_ids` is empty); no keys are requested
    /// - [`AccessError::AccessDenied`] if the policy refused any batch
    /// - [`AccessError::DecryptionUnavailable`] for any other key or
    ///   decryption failure
    pub async fn retrieve_and_decrypt(
        &self,
        blob_ids: &[BlobId],
        session: &Session,
        approval: &ApprovalCallBuilder,
    ) -> Result<Vec<DecryptedFile>> {
        // Phase 1: Download
        let slots = download_all(self.store.as_ref(), blob_ids, self.config.download_timeout).await;

        // Phase 2: Availability
        let ciphertexts = present(blob_ids, slots)?;

        // Phase 3: Key authorization
        self.fetch_keys(&ciphertexts, session, approval).await?;

        // Phase 4: Decryption
        let plaintexts = self.decrypt_all(&ciphertexts, session, approval).await?;

        // Phase 5: Finalization
        let files = self.finalize(plaintexts);
        if !files.is_empty() {
            self.completion.send_modify(|generation| *generation += 1);
        }

        tracing::info!(files = files.len(), "retrieval complete");
        Ok(files)
    }

    /// Fetch keys for every ciphertext, one batch at a time.
    async fn fetch_keys(
        &self,
        ciphertexts: &[Bytes],
        session: &Session,
        approval: &ApprovalCallBuilder,
    ) -> Result<()> {
        let batch_size = self.config.key_batch_size.max(1);

        for (batch, chunk) in ciphertexts.chunks(batch_size).enumerate() {
            let ids = chunk
                .iter()
                .map(|ct| full_id(ct))
                .collect::<Result<Vec<_>>>()?;

            let tx_bytes = self
                .ledger
                .build_call_batch(&approval.batch_for(&ids))
                .await
                .map_err(unavailable)?;

            tracing::debug!(batch, ids = ids.len(), "fetching keys");

            self.keys
                .fetch_keys(&ids, &tx_bytes, session, self.config.threshold)
                .await
                .map_err(|e| {
                    let e = AccessError::from(e);
                    tracing::warn!(batch, error = %e, "key fetch failed");
                    e
                })?;
        }

        Ok(())
    }

    /// Decrypt ciphertexts in order with the fetched keys.
    async fn decrypt_all(
        &self,
        ciphertexts: &[Bytes],
        session: &Session,
        approval: &ApprovalCallBuilder,
    ) -> Result<Vec<Vec<u8>>> {
        let mut plaintexts = Vec::with_capacity(ciphertexts.len());

        for (index, ciphertext) in ciphertexts.iter().enumerate() {
            let id = full_id(ciphertext)?;

            let tx_bytes = self
                .ledger
                .build_call_batch(&approval.batch_for([&id]))
                .await
                .map_err(unavailable)?;

            let plaintext = self
                .keys
                .decrypt(ciphertext, session, &tx_bytes)
                .await
                .map_err(|e| {
                    let e = AccessError::from(e);
                    tracing::warn!(index, id = %id, error = %e, "decryption failed");
                    e
                })?;

            plaintexts.push(plaintext);
        }

        Ok(plaintexts)
    }

    /// Classify, register, and name the plaintexts.
    fn finalize(&self, plaintexts: Vec<Vec<u8>>) -> Vec<DecryptedFile> {
        plaintexts
            .into_iter()
            .enumerate()
            .map(|(index, plaintext)| {
                let detected = classify(&plaintext);
                let data = Bytes::from(plaintext);
                let handle = self.registry.register(data.clone());

                DecryptedFile {
                    filename: format!("decrypted-{}.{}", index, detected.extension),
                    mime: detected.mime,
                    extension: detected.extension,
                    data,
                    handle,
                }
            })
            .collect()
    }
}

/// Keep the downloaded ciphertexts, in input order.
fn present(blob_ids: &[BlobId], slots: Vec<Option<Bytes>>) -> Result<Vec<Bytes>> {
    let total = blob_ids.len();
    let ciphertexts: Vec<Bytes> = slots.into_iter().flatten().collect();

    tracing::debug!(
        present = ciphertexts.len(),
        absent = total - ciphertexts.len(),
        "downloads settled"
    );

    if ciphertexts.is_empty() {
        return Err(AccessError::NoBlobsRetrievable);
    }
    Ok(ciphertexts)
}

/// The full id named in a ciphertext's header.
fn full_id(ciphertext: &[u8]) -> Result<FullId> {
    EncryptedObject::parse(ciphertext)
        .map(|object| object.id)
        .map_err(unavailable)
}

fn unavailable(e: impl Display) -> AccessError {
    AccessError::DecryptionUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_keeps_order() {
        let ids: Vec<BlobId> = ["a", "b", "c"]
            .iter()
            .map(|s| BlobId::new(*s).unwrap())
            .collect();
        let slots = vec![
            Some(Bytes::from_static(b"1")),
            None,
            Some(Bytes::from_static(b"3")),
        ];

        let kept = present(&ids, slots).unwrap();
        assert_eq!(kept, vec![Bytes::from_static(b"1"), Bytes::from_static(b"3")]);
    }

    #[test]
    fn test_present_all_absent() {
        let ids = vec![BlobId::new("a").unwrap()];
        assert!(matches!(
            present(&ids, vec![None]),
            Err(AccessError::NoBlobsRetrievable)
        ));
        assert!(matches!(
            present(&[], vec![]),
            Err(AccessError::NoBlobsRetrievable)
        ));
    }

    #[test]
    fn test_full_id_of_garbage_is_unavailable() {
        assert!(matches!(
            full_id(b"plain text, not an envelope"),
            Err(AccessError::DecryptionUnavailable(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = RetrievalConfig::default();
        assert_eq!(config.download_timeout, Duration::from_secs(10));
        assert_eq!(config.key_batch_size, 10);
        assert_eq!(config.threshold, 2);
    }
}
