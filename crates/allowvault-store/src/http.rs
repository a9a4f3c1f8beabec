//! HTTP client for the blob network.
//!
//! Reads go to an aggregator (`GET {aggregator}/v1/blobs/{id}`), writes go
//! to a publisher (`PUT {publisher}/v1/blobs?epochs=N`). The publisher
//! answers with one of two JSON shapes depending on whether the bytes were
//! already stored.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use allowvault_core::{BlobId, ObjectId};

use crate::error::{Result, StoreError};
use crate::traits::{BlobStatus, ObjectStore, StoredBlob};

/// Endpoints and limits for [`HttpBlobStore`].
#[derive(Debug, Clone)]
pub struct HttpBlobStoreConfig {
    /// Base URL of the aggregator serving reads.
    pub aggregator_url: String,
    /// Base URL of the publisher accepting writes.
    pub publisher_url: String,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl Default for HttpBlobStoreConfig {
    fn default() -> Self {
        Self {
            aggregator_url: "https://aggregator.walrus-testnet.walrus.space".to_string(),
            publisher_url: "https://publisher.walrus-testnet.walrus.space".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Blob store backed by an aggregator and a publisher.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    config: HttpBlobStoreConfig,
}

impl HttpBlobStore {
    /// Build a client for the configured endpoints.
    pub fn new(config: HttpBlobStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &HttpBlobStoreConfig {
        &self.config
    }

    fn blob_url(&self, blob_id: &BlobId) -> String {
        format!(
            "{}/v1/blobs/{}",
            self.config.aggregator_url.trim_end_matches('/'),
            blob_id
        )
    }

    fn publish_url(&self, epochs: u32) -> String {
        format!(
            "{}/v1/blobs?epochs={}",
            self.config.publisher_url.trim_end_matches('/'),
            epochs
        )
    }
}

#[async_trait]
impl ObjectStore for HttpBlobStore {
    async fn get(&self, blob_id: &BlobId) -> Result<Option<Bytes>> {
        let url = self.blob_url(blob_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                blob_id = %blob_id,
                status = status.as_u16(),
                "aggregator did not return blob"
            );
            return Ok(None);
        }

        let body = response.bytes().await?;
        tracing::debug!(blob_id = %blob_id, bytes = body.len(), "blob downloaded");
        Ok(Some(body))
    }

    async fn put(&self, data: Bytes, epochs: u32) -> Result<StoredBlob> {
        let url = self.publish_url(epochs);
        let size = data.len();
        let response = self.client.put(&url).body(data).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        let stored = parse_publish_response(&body)?;
        tracing::info!(
            blob_id = %stored.blob_id,
            end_epoch = stored.end_epoch,
            bytes = size,
            "blob published"
        );
        Ok(stored)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    newly_created: Option<NewlyCreated>,
    already_certified: Option<AlreadyCertified>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    id: String,
    blob_id: String,
    storage: Storage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Storage {
    end_epoch: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
    end_epoch: u64,
    event: CertifyEvent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertifyEvent {
    tx_digest: String,
}

/// Decode the publisher's answer into a [`StoredBlob`].
fn parse_publish_response(body: &[u8]) -> Result<StoredBlob> {
    let response: PublishResponse =
        serde_json::from_slice(body).map_err(|e| StoreError::Serialization(e.to_string()))?;

    let to_blob_id =
        |s: String| BlobId::new(s).map_err(|e| StoreError::UnexpectedResponse(e.to_string()));

    match (response.newly_created, response.already_certified) {
        (Some(created), _) => {
            let object = created.blob_object;
            let object_id = ObjectId::from_hex(&object.id)
                .map_err(|e| StoreError::UnexpectedResponse(format!("blob object id: {}", e)))?;
            Ok(StoredBlob {
                blob_id: to_blob_id(object.blob_id)?,
                end_epoch: object.storage.end_epoch,
                status: BlobStatus::NewlyCreated { object_id },
            })
        }
        (None, Some(certified)) => Ok(StoredBlob {
            blob_id: to_blob_id(certified.blob_id)?,
            end_epoch: certified.end_epoch,
            status: BlobStatus::AlreadyCertified {
                tx_digest: certified.event.tx_digest,
            },
        }),
        (None, None) => Err(StoreError::UnexpectedResponse(
            "publisher response has neither newlyCreated nor alreadyCertified".to_string(),
        )),
    }
}
