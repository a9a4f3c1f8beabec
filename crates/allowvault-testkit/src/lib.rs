//! # allowvault Testkit
//!
//! Testing utilities for allowvault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Simulators**: an in-memory ledger running the allowlist module, a key
//!   server that dry-runs approvals against it, and a blob store with
//!   injectable failures
//! - **Signers**: wallets that count requests or refuse them
//! - **Fixtures**: a seeded package, allowlist, and set of identities
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use allowvault_testkit::fixtures::{TestFixture, PNG_BYTES};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let blob = fixture.put_encrypted("photo", PNG_BYTES).await;
//!     let session = fixture.session_for(&fixture.member);
//!     let files = fixture
//!         .retriever()
//!         .retrieve_and_decrypt(&[blob], &session, &fixture.approval())
//!         .await
//!         .unwrap();
//!     assert_eq!(files[0].filename, "decrypted-0.png");
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod keyserver;
pub mod ledger;
pub mod signers;
pub mod store;

pub use fixtures::{blob_id, TestFixture, TestRetriever, NOW_MS, PNG_BYTES, TEXT_BYTES};
pub use keyserver::MemoryKeyServer;
pub use ledger::MemoryLedger;
pub use signers::{CountingSigner, RejectingSigner};
pub use store::FlakyObjectStore;
