//! Error types for the access module.

use thiserror::Error;

use crate::keys::KeyServiceError;

/// Errors that can occur while retrieving or uploading files.
///
/// Retrieval reports exactly one of the first three variants. Per-blob
/// download failures never surface here; they only make a blob absent.
#[derive(Debug, Error)]
pub enum AccessError {
    /// None of the requested blobs could be downloaded.
    #[error("no blobs could be retrieved")]
    NoBlobsRetrievable,

    /// The policy refused to release keys.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Keys could not be fetched or a ciphertext could not be decrypted.
    #[error("decryption unavailable: {0}")]
    DecryptionUnavailable(String),

    /// Upload rejected before encryption.
    #[error("file too large: {size} bytes, limit is {max}")]
    FileTooLarge { size: usize, max: usize },

    /// The key service could not encrypt.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Blob store error during upload.
    #[error("store error: {0}")]
    StoreError(#[from] allowvault_store::StoreError),
}

impl AccessError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AccessError::NoBlobsRetrievable => "Cannot retrieve files from this Walrus aggregator, \
                try again (a randomly selected aggregator will be used). Files uploaded more than \
                1 epoch ago have been deleted from Walrus."
                .to_string(),
            AccessError::AccessDenied(_) => "No access to decryption keys".to_string(),
            AccessError::DecryptionUnavailable(_) => {
                "Unable to decrypt files, try again".to_string()
            }
            AccessError::FileTooLarge { max, .. } => {
                format!("File size must be less than {} MiB", max / (1024 * 1024))
            }
            AccessError::EncryptionFailed(_) | AccessError::StoreError(_) => {
                "Error uploading the file, try again".to_string()
            }
        }
    }
}

impl From<KeyServiceError> for AccessError {
    fn from(e: KeyServiceError) -> Self {
        match e {
            KeyServiceError::NoAccess(msg) => AccessError::AccessDenied(msg),
            KeyServiceError::Other(msg) => AccessError::DecryptionUnavailable(msg),
        }
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_messages() {
        assert!(AccessError::NoBlobsRetrievable
            .user_message()
            .starts_with("Cannot retrieve files from this Walrus aggregator, try again"));
        assert_eq!(
            AccessError::AccessDenied("x".into()).user_message(),
            "No access to decryption keys"
        );
        assert_eq!(
            AccessError::DecryptionUnavailable("x".into()).user_message(),
            "Unable to decrypt files, try again"
        );
    }

    #[test]
    fn test_no_blobs_message_is_exact() {
        assert_eq!(
            AccessError::NoBlobsRetrievable.user_message(),
            "Cannot retrieve files from this Walrus aggregator, try again (a randomly selected \
             aggregator will be used). Files uploaded more than 1 epoch ago have been deleted \
             from Walrus."
        );
    }

    #[test]
    fn test_key_service_error_mapping() {
        assert!(matches!(
            AccessError::from(KeyServiceError::NoAccess("denied".into())),
            AccessError::AccessDenied(_)
        ));
        assert!(matches!(
            AccessError::from(KeyServiceError::Other("down".into())),
            AccessError::DecryptionUnavailable(_)
        ));
    }
}
