//! # allowvault Permissions
//!
//! Everything needed to prove to the key service that the caller may
//! decrypt: sessions, the wallet signer seam, ledger call batches, and the
//! allowlist policy.
//!
//! ## Key Concepts
//!
//! - **Session**: a time-boxed delegation from a wallet to an ephemeral key,
//!   bound to one address and one package
//! - **SessionManager**: reuses a cached session while valid, otherwise asks
//!   the [`Signer`] for a new one
//! - **CallBatch**: an ordered list of Move calls, serialized by the
//!   [`LedgerClient`] into transaction bytes
//! - **ApprovalCallBuilder**: appends `seal_approve(id, policy)` calls, which
//!   the key service dry-runs before releasing keys
//! - **EncryptedObject**: the ciphertext envelope whose header names the full
//!   id it was encrypted under
//!
//! ## Usage
//!
//! ```rust,no_run
//! use allowvault_core::{Keypair, ObjectId};
//! use allowvault_perms::{KeypairSigner, SessionConfig, SessionManager, Signer};
//! use allowvault_store::MemorySessionCache;
//!
//! async fn example(package_id: ObjectId, now_ms: i64) {
//!     let signer = KeypairSigner::new(Keypair::generate());
//!     let manager = SessionManager::new(MemorySessionCache::new(), SessionConfig::default());
//!     let session = manager
//!         .obtain_session(&signer.address(), &package_id, &signer, now_ms)
//!         .await
//!         .unwrap();
//!     assert!(session.is_signed());
//! }
//! ```

pub mod allowlist;
pub mod calls;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod policy;
pub mod session;
pub mod signer;

pub use allowlist::{Allowlist, AllowlistCalls, AllowlistCap, Feed};
pub use calls::{CallArg, CallBatch, MoveCall};
pub use envelope::{EncryptedObject, ENVELOPE_VERSION};
pub use error::{PermsError, Result};
pub use ledger::{CreatedObject, LedgerClient, OwnedObject, TxEffects};
pub use manager::{SessionConfig, SessionManager};
pub use policy::{ApprovalCallBuilder, ALLOWLIST_MODULE, APPROVE_FUNCTION};
pub use session::{Session, SessionCertificate};
pub use signer::{KeypairSigner, Signer, SignerError, WalletSignature};
