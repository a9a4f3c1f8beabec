//! # allowvault Store
//!
//! Storage abstractions for allowvault. Two independent concerns live here:
//!
//! - [`SessionCache`]: a tiny key-value slot store that keeps the serialized
//!   decryption session between runs, so users are not asked to sign again
//!   while their session is still valid.
//! - [`ObjectStore`]: the blob network that holds encrypted files.
//!
//! ## Key Types
//!
//! - [`SqliteSessionCache`] - Persistent session cache
//! - [`MemorySessionCache`] - In-memory session cache for tests
//! - [`HttpBlobStore`] - Aggregator/publisher HTTP client
//! - [`MemoryObjectStore`] - In-memory blob store for tests
//! - [`StoredBlob`] - Result of uploading a blob
//!
//! ## Usage
//!
//! ```rust,no_run
//! use allowvault_store::{SessionCache, SqliteSessionCache, SESSION_SLOT};
//!
//! async fn example() {
//!     let cache = SqliteSessionCache::open("sessions.db").unwrap();
//!     let cached = cache.load(SESSION_SLOT).await.unwrap();
//!     if cached.is_none() {
//!         // no session yet; one will be created and signed
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Absence is not an error**: `load` and `get` return `Ok(None)` for
//!   missing entries. Errors are reserved for broken backends.
//! - **Idempotent puts**: uploading the same bytes twice to the memory store
//!   reports `AlreadyCertified`, mirroring the blob network.

pub mod error;
pub mod http;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use http::{HttpBlobStore, HttpBlobStoreConfig};
pub use memory::{MemoryObjectStore, MemorySessionCache};
pub use sqlite::SqliteSessionCache;
pub use traits::{BlobStatus, ObjectStore, SessionCache, StoredBlob, SESSION_SLOT};
