//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while authorizing access.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The signer refused, or produced a signature we cannot use.
    #[error("authorization denied: {0}")]
    AuthDenied(String),

    /// A cached session could not be reconstructed.
    #[error("cached session is corrupt: {0}")]
    CacheCorrupt(String),

    /// The session is not usable yet.
    #[error("session is not signed")]
    SessionNotSigned,

    /// Invalid session parameters.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Ciphertext header could not be parsed.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Invalid argument for a ledger call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Ledger object not found.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Ledger object has unexpected fields.
    #[error("malformed object {id}: {reason}")]
    MalformedObject { id: String, reason: String },

    /// The ledger client failed.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Session cache backend error.
    #[error("store error: {0}")]
    StoreError(#[from] allowvault_store::StoreError),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] allowvault_core::CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
