//! Parallel ciphertext download.
//!
//! Every blob is requested at once, each under its own timeout. Failures of
//! any kind make that blob absent; they are logged and otherwise dropped.

use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use thiserror::Error;

use allowvault_core::BlobId;
use allowvault_store::{ObjectStore, StoreError};

/// Why a single blob could not be downloaded.
#[derive(Debug, Error)]
pub enum DownloadFailure {
    #[error("blob not found")]
    Missing,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Download one blob under `timeout`.
pub async fn download_one<S: ObjectStore + ?Sized>(
    store: &S,
    blob_id: &BlobId,
    timeout: Duration,
) -> Result<Bytes, DownloadFailure> {
    match tokio::time::timeout(timeout, store.get(blob_id)).await {
        Ok(Ok(Some(data))) => Ok(data),
        Ok(Ok(None)) => Err(DownloadFailure::Missing),
        Ok(Err(e)) => Err(DownloadFailure::Store(e)),
        Err(_) => Err(DownloadFailure::Timeout(timeout)),
    }
}

/// Download all blobs concurrently.
///
/// The result has one slot per input, in input order; `None` marks a blob
/// that could not be downloaded.
pub async fn download_all<S: ObjectStore + ?Sized>(
    store: &S,
    blob_ids: &[BlobId],
    timeout: Duration,
) -> Vec<Option<Bytes>> {
    let downloads = blob_ids.iter().map(|blob_id| async move {
        match download_one(store, blob_id, timeout).await {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(blob_id = %blob_id, error = %e, "failed to download blob");
                None
            }
        }
    });

    join_all(downloads).await
}
