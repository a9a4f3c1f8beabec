//! Key service abstraction.
//!
//! The key service holds the threshold key servers. It releases decryption
//! keys for a set of full ids only after dry-running the approval
//! transaction it is handed, and it performs the local decryption with the
//! keys it has fetched for a session.

use async_trait::async_trait;
use thiserror::Error;

use allowvault_core::{FullId, ObjectId};
use allowvault_perms::Session;

/// Errors from the key service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyServiceError {
    /// The policy check failed: the caller is not allowed.
    #[error("no access: {0}")]
    NoAccess(String),

    /// Anything else: unreachable servers, bad ciphertext, missing keys.
    #[error("key service error: {0}")]
    Other(String),
}

/// Threshold encryption service.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Fetch and cache keys for `ids`, proving access with `tx_bytes`.
    async fn fetch_keys(
        &self,
        ids: &[FullId],
        tx_bytes: &[u8],
        session: &Session,
        threshold: u8,
    ) -> Result<(), KeyServiceError>;

    /// Decrypt an envelope using previously fetched keys.
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        session: &Session,
        tx_bytes: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError>;

    /// Encrypt `plaintext` under `id` for the policies of `package_id`.
    ///
    /// Returns the serialized envelope.
    async fn encrypt(
        &self,
        package_id: &ObjectId,
        id: &FullId,
        threshold: u8,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError>;
}
