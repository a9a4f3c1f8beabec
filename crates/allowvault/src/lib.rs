//! # allowvault
//!
//! Allowlist-gated encrypted file sharing.
//!
//! ## Overview
//!
//! An owner creates an allowlist on the ledger, encrypts files client-side
//! under an identity tied to that allowlist, and stores the ciphertexts in a
//! blob network. Anyone on the allowlist can then decrypt them:
//!
//! 1. The wallet signs a time-boxed **session**, cached between runs
//! 2. Ciphertexts are downloaded in parallel; missing ones are skipped
//! 3. Keys are requested in batches, each backed by an approval transaction
//!    the key servers dry-run against the allowlist
//! 4. Ciphertexts are decrypted, classified, and registered locally
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use allowvault::{Vault, VaultConfig};
//! use allowvault::core::ObjectId;
//! use allowvault::store::{HttpBlobStore, HttpBlobStoreConfig, SqliteSessionCache};
//! # use allowvault::perms::{LedgerClient, Signer};
//! # use allowvault::access::KeyService;
//!
//! async fn example<L: LedgerClient, K: KeyService, G: Signer>(
//!     ledger: L,
//!     keys: K,
//!     wallet: &G,
//!     package_id: ObjectId,
//!     allowlist: ObjectId,
//!     now_ms: i64,
//! ) {
//!     let store = HttpBlobStore::new(HttpBlobStoreConfig::default()).unwrap();
//!     let cache = SqliteSessionCache::open("sessions.db").unwrap();
//!     let vault = Vault::new(
//!         Arc::new(ledger),
//!         Arc::new(store),
//!         Arc::new(keys),
//!         cache,
//!         VaultConfig::new(package_id),
//!     );
//!
//!     match vault.view_feed(wallet, &allowlist, now_ms).await {
//!         Ok(files) => {
//!             for file in &files {
//!                 println!("{} ({}) at {}", file.filename, file.mime, file.url());
//!             }
//!         }
//!         Err(e) => eprintln!("{}", e.user_message()),
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `allowvault::core` - Identifiers, keys, and the mime sniffer
//! - `allowvault::store` - Session cache and blob store
//! - `allowvault::perms` - Sessions, signers, ledger calls, and allowlists
//! - `allowvault::access` - Retrieval pipeline, key service, and upload

pub mod config;
pub mod error;
pub mod vault;

// Re-export component crates
pub use allowvault_access as access;
pub use allowvault_core as core;
pub use allowvault_perms as perms;
pub use allowvault_store as store;

// Re-export main types for convenience
pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use vault::{CreatedAllowlist, Vault};

// Re-export commonly used types
pub use allowvault_access::{AccessError, DecryptedFile, UploadedBlob};
pub use allowvault_core::{Address, BlobId, Keypair, ObjectId};
pub use allowvault_perms::{Session, Signer};
