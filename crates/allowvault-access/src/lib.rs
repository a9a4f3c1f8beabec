//! # allowvault Access
//!
//! Turns blob ids into viewable files for callers the policy allows, and
//! files into encrypted blobs.
//!
//! ## Retrieval
//!
//! [`Retriever::retrieve_and_decrypt`] downloads every blob in parallel,
//! drops the ones that did not arrive, fetches keys in batches of ten by
//! presenting approval transactions to the [`KeyService`], and decrypts
//! sequentially. Decryption is all-or-nothing.
//!
//! Failures are reported as one [`AccessError`]. Use
//! [`AccessError::user_message`] for text shown to users.
//!
//! ## Upload
//!
//! [`Uploader::encrypt_and_upload`] encrypts under `policy id || nonce` and
//! stores the envelope in the blob network.

pub mod download;
pub mod error;
pub mod file;
pub mod keys;
pub mod pipeline;
pub mod upload;

pub use download::{download_all, download_one, DownloadFailure};
pub use error::{AccessError, Result};
pub use file::{DecryptedFile, FileHandle, FileRegistry};
pub use keys::{KeyService, KeyServiceError};
pub use pipeline::{RetrievalConfig, Retriever};
pub use upload::{UploadConfig, UploadedBlob, Uploader};
