//! The Vault: unified API for allowlist-gated file sharing.
//!
//! The Vault brings together the session manager, the retrieval pipeline,
//! the uploader, and allowlist administration for one package.

use std::sync::Arc;

use tokio::sync::watch;

use allowvault_access::{DecryptedFile, FileRegistry, KeyService, Retriever, UploadedBlob, Uploader};
use allowvault_core::{Address, BlobId, ObjectId};
use allowvault_perms::allowlist::{ALLOWLIST_TYPE_SUFFIX, CAP_TYPE_SUFFIX};
use allowvault_perms::{
    Allowlist, AllowlistCalls, AllowlistCap, ApprovalCallBuilder, CallBatch, Feed, LedgerClient,
    Session, SessionManager, Signer, TxEffects,
};
use allowvault_store::{ObjectStore, SessionCache};

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// Ids of a newly created allowlist and its admin cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedAllowlist {
    pub allowlist_id: ObjectId,
    pub cap_id: ObjectId,
}

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Creating allowlists and managing their members
/// - Encrypting, uploading, and publishing files
/// - Obtaining decryption sessions
/// - Retrieving and decrypting files the caller is allowed to see
pub struct Vault<L, S, K, C>
where
    L: LedgerClient,
    S: ObjectStore,
    K: KeyService,
    C: SessionCache,
{
    ledger: Arc<L>,
    sessions: SessionManager<C>,
    retriever: Retriever<L, S, K>,
    uploader: Uploader<S, K>,
    calls: AllowlistCalls,
    config: VaultConfig,
}

impl<L, S, K, C> Vault<L, S, K, C>
where
    L: LedgerClient,
    S: ObjectStore,
    K: KeyService,
    C: SessionCache,
{
    /// Create a vault over the given collaborators.
    pub fn new(ledger: Arc<L>, store: Arc<S>, keys: Arc<K>, cache: C, config: VaultConfig) -> Self {
        let retriever = Retriever::new(
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&keys),
            config.retrieval.clone(),
        );
        let uploader = Uploader::new(store, keys, config.package_id, config.upload.clone());

        Self {
            ledger,
            sessions: SessionManager::new(cache, config.session.clone()),
            retriever,
            uploader,
            calls: AllowlistCalls::new(config.package_id),
            config,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Get the session manager.
    pub fn sessions(&self) -> &SessionManager<C> {
        &self.sessions
    }

    /// Registry holding the decrypted files' local references.
    pub fn registry(&self) -> &FileRegistry {
        self.retriever.registry()
    }

    /// Watch for completed retrievals.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.retriever.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Allowlist Administration
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an allowlist owned by `sender`.
    pub async fn create_allowlist(&self, sender: &Address, name: &str) -> Result<CreatedAllowlist> {
        let effects = self.submit(&self.calls.create(name)?, sender).await?;

        let find = |suffix: &str| {
            effects
                .created_of_type(suffix)
                .map(|object| object.id)
                .ok_or_else(|| VaultError::MissingCreatedObject {
                    digest: effects.digest.clone(),
                    expected: suffix.trim_start_matches("::").to_string(),
                })
        };

        Ok(CreatedAllowlist {
            allowlist_id: find(ALLOWLIST_TYPE_SUFFIX)?,
            cap_id: find(CAP_TYPE_SUFFIX)?,
        })
    }

    /// Add a member given as user input.
    pub async fn add_member(
        &self,
        sender: &Address,
        allowlist: &ObjectId,
        cap: &ObjectId,
        member: &str,
    ) -> Result<TxEffects> {
        let member = parse_address(member)?;
        self.submit(&self.calls.add(allowlist, cap, &member), sender)
            .await
    }

    pub async fn remove_member(
        &self,
        sender: &Address,
        allowlist: &ObjectId,
        cap: &ObjectId,
        member: &Address,
    ) -> Result<TxEffects> {
        self.submit(&self.calls.remove(allowlist, cap, member), sender)
            .await
    }

    /// Read an allowlist.
    pub async fn allowlist(&self, id: &ObjectId) -> Result<Allowlist> {
        Ok(Allowlist::load(self.ledger.as_ref(), id).await?)
    }

    /// Admin caps held by `owner`.
    pub async fn caps(&self, owner: &Address) -> Result<Vec<AllowlistCap>> {
        Ok(AllowlistCap::owned_by(self.ledger.as_ref(), owner).await?)
    }

    /// Read the blobs published to an allowlist.
    pub async fn feed(&self, allowlist: &ObjectId) -> Result<Feed> {
        Ok(Feed::load(self.ledger.as_ref(), allowlist).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt a file for `allowlist` and store it.
    pub async fn upload(&self, allowlist: &ObjectId, data: &[u8]) -> Result<UploadedBlob> {
        Ok(self.uploader.encrypt_and_upload(allowlist, data).await?)
    }

    /// Attach an uploaded blob to an allowlist's feed.
    pub async fn publish(
        &self,
        sender: &Address,
        allowlist: &ObjectId,
        cap: &ObjectId,
        blob_id: &BlobId,
    ) -> Result<TxEffects> {
        self.submit(&self.calls.publish(allowlist, cap, blob_id), sender)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a signed session for the signer's active address.
    pub async fn open_session<G: Signer + ?Sized>(
        &self,
        signer: &G,
        now_ms: i64,
    ) -> Result<Session> {
        let address = signer.address();
        Ok(self
            .sessions
            .obtain_session(&address, &self.config.package_id, signer, now_ms)
            .await?)
    }

    /// Decrypt blobs published under `allowlist`.
    pub async fn view(
        &self,
        blob_ids: &[BlobId],
        session: &Session,
        allowlist: &ObjectId,
    ) -> Result<Vec<DecryptedFile>> {
        let approval = ApprovalCallBuilder::new(self.config.package_id, *allowlist);
        Ok(self
            .retriever
            .retrieve_and_decrypt(blob_ids, session, &approval)
            .await?)
    }

    /// Open a session and decrypt everything in an allowlist's feed.
    pub async fn view_feed<G: Signer + ?Sized>(
        &self,
        signer: &G,
        allowlist: &ObjectId,
        now_ms: i64,
    ) -> Result<Vec<DecryptedFile>> {
        let feed = self.feed(allowlist).await?;
        let session = self.open_session(signer, now_ms).await?;
        self.view(&feed.blob_ids, &session, allowlist).await
    }

    async fn submit(&self, batch: &CallBatch, sender: &Address) -> Result<TxEffects> {
        let effects = self
            .ledger
            .submit(batch, sender, self.config.gas_budget)
            .await?;

        for call in batch.calls() {
            tracing::info!(
                call = %call,
                digest = %effects.digest,
                sender = %sender,
                "ledger call executed"
            );
        }
        Ok(effects)
    }
}

/// Parse a user-entered address.
fn parse_address(input: &str) -> Result<Address> {
    Address::from_hex(input).map_err(|e| VaultError::InvalidAddress {
        input: input.to_string(),
        reason: e.to_string(),
    })
}
