//! End-to-end flows through the Vault with simulated collaborators.

use std::sync::Arc;

use allowvault::access::AccessError;
use allowvault::core::{Keypair, ObjectId};
use allowvault::perms::{PermsError, Session};
use allowvault::store::{MemorySessionCache, SessionCache, SqliteSessionCache, SESSION_SLOT};
use allowvault::{Signer, Vault, VaultConfig, VaultError};
use allowvault_testkit::{
    CountingSigner, FlakyObjectStore, MemoryKeyServer, MemoryLedger, RejectingSigner, NOW_MS,
    PNG_BYTES, TEXT_BYTES,
};

const TEN_MINUTES: i64 = 10 * 60_000;

struct Harness<C: SessionCache> {
    vault: Vault<MemoryLedger, FlakyObjectStore, MemoryKeyServer, C>,
    keys: Arc<MemoryKeyServer>,
    owner: CountingSigner,
    member: CountingSigner,
    outsider: CountingSigner,
}

fn harness_with<C: SessionCache>(cache: C) -> Harness<C> {
    let package_id = ObjectId::from_bytes([0x42; 32]);
    let ledger = Arc::new(MemoryLedger::new(package_id));
    let keys = Arc::new(MemoryKeyServer::new(Arc::clone(&ledger)));
    let store = Arc::new(FlakyObjectStore::new());

    Harness {
        vault: Vault::new(
            ledger,
            store,
            Arc::clone(&keys),
            cache,
            VaultConfig::new(package_id),
        ),
        keys,
        owner: CountingSigner::new(Keypair::from_seed(&[1u8; 32])),
        member: CountingSigner::new(Keypair::from_seed(&[2u8; 32])),
        outsider: CountingSigner::new(Keypair::from_seed(&[3u8; 32])),
    }
}

fn harness() -> Harness<MemorySessionCache> {
    harness_with(MemorySessionCache::new())
}

#[tokio::test]
async fn test_share_and_view_feed() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let h = harness();
    let owner = h.owner.address();
    let member = h.member.address();

    let created = h.vault.create_allowlist(&owner, "family photos").await.unwrap();
    h.vault
        .add_member(&owner, &created.allowlist_id, &created.cap_id, &member.to_hex())
        .await
        .unwrap();

    for data in [PNG_BYTES, TEXT_BYTES] {
        let uploaded = h.vault.upload(&created.allowlist_id, data).await.unwrap();
        assert!(uploaded.is_newly_created());
        assert!(uploaded.full_id.has_policy_prefix(&created.allowlist_id));
        assert_eq!(uploaded.full_id.as_bytes().len(), 37);
        h.vault
            .publish(&owner, &created.allowlist_id, &created.cap_id, &uploaded.blob_id)
            .await
            .unwrap();
    }

    let feed = h.vault.feed(&created.allowlist_id).await.unwrap();
    assert_eq!(feed.name, "family photos");
    assert_eq!(feed.blob_ids.len(), 2);

    let files = h
        .vault
        .view_feed(&h.member, &created.allowlist_id, NOW_MS)
        .await
        .unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].filename, "decrypted-0.png");
    assert_eq!(files[1].filename, "decrypted-1.txt");
    assert_eq!(h.member.calls(), 1);
}

#[tokio::test]
async fn test_outsider_is_denied() {
    let h = harness();
    let owner = h.owner.address();
    let created = h.vault.create_allowlist(&owner, "private").await.unwrap();
    let uploaded = h.vault.upload(&created.allowlist_id, TEXT_BYTES).await.unwrap();

    let session = h.vault.open_session(&h.outsider, NOW_MS).await.unwrap();
    let err = h
        .vault
        .view(&[uploaded.blob_id], &session, &created.allowlist_id)
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::Access(AccessError::AccessDenied(_))));
    assert_eq!(err.user_message(), "No access to decryption keys");
    assert_eq!(h.keys.decrypt_count(), 0);
}

#[tokio::test]
async fn test_removed_member_loses_access() {
    let h = harness();
    let owner = h.owner.address();
    let member = h.member.address();
    let created = h.vault.create_allowlist(&owner, "team").await.unwrap();
    h.vault
        .add_member(&owner, &created.allowlist_id, &created.cap_id, &member.to_hex())
        .await
        .unwrap();
    let uploaded = h.vault.upload(&created.allowlist_id, TEXT_BYTES).await.unwrap();
    let session = h.vault.open_session(&h.member, NOW_MS).await.unwrap();

    h.vault
        .view(&[uploaded.blob_id.clone()], &session, &created.allowlist_id)
        .await
        .unwrap();

    h.vault
        .remove_member(&owner, &created.allowlist_id, &created.cap_id, &member)
        .await
        .unwrap();
    assert!(!h.vault.allowlist(&created.allowlist_id).await.unwrap().contains(&member));

    let err = h
        .vault
        .view(&[uploaded.blob_id], &session, &created.allowlist_id)
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Access(AccessError::AccessDenied(_))));
}

#[tokio::test]
async fn test_session_reused_until_expiry() {
    let h = harness();

    let first = h.vault.open_session(&h.member, NOW_MS).await.unwrap();
    let again = h.vault.open_session(&h.member, NOW_MS + 60_000).await.unwrap();
    assert_eq!(h.member.calls(), 1);
    assert_eq!(first.session_key(), again.session_key());

    let renewed = h
        .vault
        .open_session(&h.member, NOW_MS + TEN_MINUTES)
        .await
        .unwrap();
    assert_eq!(h.member.calls(), 2);
    assert_ne!(renewed.session_key(), first.session_key());

    let cached = h.vault.sessions().cache().load(SESSION_SLOT).await.unwrap().unwrap();
    assert_eq!(Session::import(&cached).unwrap().session_key(), renewed.session_key());
}

#[tokio::test]
async fn test_rejected_signature() {
    let h = harness();
    h.vault.open_session(&h.member, NOW_MS).await.unwrap();

    let refusing = RejectingSigner::new(h.member.address());
    let err = h
        .vault
        .open_session(&refusing, NOW_MS + TEN_MINUTES)
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::Permission(PermsError::AuthDenied(_))));
    assert_eq!(refusing.calls(), 1);
    assert!(!h.vault.sessions().cache().contains(SESSION_SLOT));
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");

    let first = {
        let h = harness_with(SqliteSessionCache::open(&path).unwrap());
        let session = h.vault.open_session(&h.member, NOW_MS).await.unwrap();
        assert_eq!(h.member.calls(), 1);
        session
    };

    let h = harness_with(SqliteSessionCache::open(&path).unwrap());
    let restored = h.vault.open_session(&h.member, NOW_MS + 1_000).await.unwrap();
    assert_eq!(h.member.calls(), 0);
    assert_eq!(restored.session_key(), first.session_key());
}

#[tokio::test]
async fn test_admin_validation() {
    let h = harness();
    let owner = h.owner.address();

    let err = h.vault.create_allowlist(&owner, "  ").await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Permission(PermsError::InvalidArgument(_))
    ));

    let created = h.vault.create_allowlist(&owner, "x").await.unwrap();
    let err = h
        .vault
        .add_member(&owner, &created.allowlist_id, &created.cap_id, "not-an-address")
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidAddress { .. }));

    // Only the cap holder may change membership
    let outsider = h.outsider.address();
    let err = h
        .vault
        .add_member(&outsider, &created.allowlist_id, &created.cap_id, &outsider.to_hex())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Permission(PermsError::Ledger(_))));
}

#[tokio::test]
async fn test_caps_listed_for_owner() {
    let h = harness();
    let owner = h.owner.address();
    let a = h.vault.create_allowlist(&owner, "a").await.unwrap();
    let b = h.vault.create_allowlist(&owner, "b").await.unwrap();

    let mut lists: Vec<ObjectId> = h
        .vault
        .caps(&owner)
        .await
        .unwrap()
        .into_iter()
        .map(|cap| cap.allowlist_id)
        .collect();
    lists.sort();
    let mut expected = vec![a.allowlist_id, b.allowlist_id];
    expected.sort();
    assert_eq!(lists, expected);

    assert!(h.vault.caps(&h.member.address()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_size_limit() {
    let h = harness();
    let created = h.vault.create_allowlist(&h.owner.address(), "big").await.unwrap();
    let too_big = vec![0u8; 10 * 1024 * 1024 + 1];

    let err = h.vault.upload(&created.allowlist_id, &too_big).await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Access(AccessError::FileTooLarge { .. })
    ));
    assert_eq!(err.user_message(), "File size must be less than 10 MiB");
}

#[tokio::test]
async fn test_identical_uploads_get_distinct_blobs() {
    let h = harness();
    let created = h.vault.create_allowlist(&h.owner.address(), "dup").await.unwrap();

    // Fresh nonces make identical plaintexts distinct ciphertexts
    let first = h.vault.upload(&created.allowlist_id, TEXT_BYTES).await.unwrap();
    let second = h.vault.upload(&created.allowlist_id, TEXT_BYTES).await.unwrap();
    assert_ne!(first.blob_id, second.blob_id);
    assert!(second.is_newly_created());
}

#[tokio::test]
async fn test_empty_feed_cannot_be_viewed() {
    let h = harness();
    let created = h.vault.create_allowlist(&h.owner.address(), "empty").await.unwrap();

    let err = h
        .vault
        .view_feed(&h.owner, &created.allowlist_id, NOW_MS)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::Access(AccessError::NoBlobsRetrievable)
    ));
    assert!(err.user_message().contains("Files uploaded more than 1 epoch ago"));
}
