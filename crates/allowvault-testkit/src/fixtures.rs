//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: one package, one allowlist with
//! an owner and a member, an outsider who is not on it, and the simulators
//! wired together.

use std::sync::Arc;

use allowvault_access::{KeyService, RetrievalConfig, Retriever};
use allowvault_core::{BlobId, FullId, Keypair, ObjectId};
use allowvault_perms::{ApprovalCallBuilder, Session, WalletSignature};

use crate::keyserver::MemoryKeyServer;
use crate::ledger::MemoryLedger;
use crate::store::FlakyObjectStore;

/// A fixed point in time (Unix ms) used by fixtures.
pub const NOW_MS: i64 = 1_700_000_000_000;

/// A minimal PNG: signature plus the start of an IHDR chunk.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
];

/// Plain ASCII text.
pub const TEXT_BYTES: &[u8] = b"meeting notes: bring the quarterly numbers\n";

/// Retriever type produced by [`TestFixture::retriever`].
pub type TestRetriever = Retriever<MemoryLedger, FlakyObjectStore, MemoryKeyServer>;

/// A test fixture with a seeded ledger, key server, and blob store.
pub struct TestFixture {
    pub package_id: ObjectId,
    pub ledger: Arc<MemoryLedger>,
    pub keys: Arc<MemoryKeyServer>,
    pub store: Arc<FlakyObjectStore>,
    /// Holds the allowlist cap.
    pub owner: Keypair,
    /// On the allowlist.
    pub member: Keypair,
    /// Not on the allowlist.
    pub outsider: Keypair,
    pub allowlist_id: ObjectId,
    pub cap_id: ObjectId,
}

impl TestFixture {
    /// Create a fixture with deterministic identities.
    pub fn new() -> Self {
        let package_id = ObjectId::from_bytes([0x5E; 32]);
        let ledger = Arc::new(MemoryLedger::new(package_id));
        let keys = Arc::new(MemoryKeyServer::new(Arc::clone(&ledger)));

        let owner = Keypair::from_seed(&[1u8; 32]);
        let member = Keypair::from_seed(&[2u8; 32]);
        let outsider = Keypair::from_seed(&[3u8; 32]);

        let (allowlist_id, cap_id) =
            ledger.seed_allowlist(&owner.address(), "fixture", &[member.address()]);

        Self {
            package_id,
            ledger,
            keys,
            store: Arc::new(FlakyObjectStore::new()),
            owner,
            member,
            outsider,
            allowlist_id,
            cap_id,
        }
    }

    /// Approval builder for the fixture allowlist.
    pub fn approval(&self) -> ApprovalCallBuilder {
        ApprovalCallBuilder::new(self.package_id, self.allowlist_id)
    }

    /// Encrypt `plaintext` for the fixture allowlist and store it as `name`.
    pub async fn put_encrypted(&self, name: &str, plaintext: &[u8]) -> BlobId {
        let id = FullId::for_policy(&self.allowlist_id, name.as_bytes());
        let envelope = self
            .keys
            .encrypt(&self.package_id, &id, 2, plaintext)
            .await
            .unwrap();
        let blob_id = blob_id(name);
        self.store.insert(blob_id.clone(), envelope);
        blob_id
    }

    /// Store raw bytes as `name`, bypassing encryption.
    pub fn put_raw(&self, name: &str, bytes: &[u8]) -> BlobId {
        let blob_id = blob_id(name);
        self.store.insert(blob_id.clone(), bytes.to_vec());
        blob_id
    }

    /// A signed session for `keypair`, created at [`NOW_MS`].
    pub fn session_for(&self, keypair: &Keypair) -> Session {
        let mut session = Session::new(keypair.address(), self.package_id, 10, NOW_MS).unwrap();
        let signature = WalletSignature {
            public_key: keypair.public_key(),
            signature: keypair.sign(&session.personal_message()),
        };
        session.set_personal_message_signature(signature).unwrap();
        session
    }

    /// A retriever over the fixture's simulators with default config.
    pub fn retriever(&self) -> TestRetriever {
        self.retriever_with(RetrievalConfig::default())
    }

    pub fn retriever_with(&self, config: RetrievalConfig) -> TestRetriever {
        Retriever::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.store),
            Arc::clone(&self.keys),
            config,
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for a blob id in tests.
pub fn blob_id(name: &str) -> BlobId {
    BlobId::new(name).unwrap()
}
