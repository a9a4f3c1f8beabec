//! Error types for the vault.

use allowvault_access::AccessError;
use allowvault_core::CoreError;
use allowvault_perms::PermsError;
use allowvault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Session, ledger, or policy error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Retrieval or upload error.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// A user-supplied address did not parse.
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    /// A transaction succeeded but did not create what it should have.
    #[error("transaction {digest} did not create {expected}")]
    MissingCreatedObject { digest: String, expected: String },
}

impl VaultError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::Access(e) => e.user_message(),
            VaultError::Permission(PermsError::AuthDenied(_)) => {
                "A wallet signature is required to access files".to_string()
            }
            VaultError::Permission(PermsError::InvalidArgument(reason)) => reason.clone(),
            VaultError::InvalidAddress { .. } => "Invalid address".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
