//! Error types for allowvault core primitives.

use thiserror::Error;

/// Errors that can occur when parsing or verifying core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("blob id must not be empty")]
    EmptyBlobId,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
