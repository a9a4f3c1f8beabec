//! # allowvault Core
//!
//! Pure primitives for allowvault: ledger identifiers, blob identifiers,
//! Ed25519 keys and the addresses derived from them, and content sniffing
//! for decrypted files.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ObjectId`] - 32-byte identifier of a ledger object or package
//! - [`Address`] - 32-byte account address derived from an Ed25519 public key
//! - [`BlobId`] - Opaque handle to a ciphertext in the blob store
//! - [`FullId`] - Identity embedded in a ciphertext header, used for key release
//! - [`Keypair`] - Ed25519 signing keypair
//!
//! ## Content Sniffing
//!
//! Decrypted payloads carry no metadata. [`classify`] infers a MIME type and
//! file extension from leading magic bytes. See the [`mime`] module.

pub mod crypto;
pub mod error;
pub mod mime;
pub mod types;

pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair};
pub use error::{CoreError, Result};
pub use mime::{classify, Detected};
pub use types::{Address, BlobId, FullId, ObjectId};
