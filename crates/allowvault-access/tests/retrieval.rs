//! Retrieval pipeline behavior against the in-memory simulators.

use std::time::Duration;

use allowvault_access::{AccessError, KeyService, RetrievalConfig};
use allowvault_core::{FullId, ObjectId};
use allowvault_perms::ApprovalCallBuilder;
use allowvault_testkit::{blob_id, TestFixture, PNG_BYTES, TEXT_BYTES};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[tokio::test]
async fn test_partial_downloads_yield_named_files() {
    init_tracing();
    let fixture = TestFixture::new();
    let png = fixture.put_encrypted("png", PNG_BYTES).await;
    let missing = blob_id("missing");
    let text = fixture.put_encrypted("text", TEXT_BYTES).await;

    let session = fixture.session_for(&fixture.member);
    let retriever = fixture.retriever();
    let files = retriever
        .retrieve_and_decrypt(&[png, missing, text], &session, &fixture.approval())
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].mime, "image/png");
    assert_eq!(files[0].filename, "decrypted-0.png");
    assert_eq!(&files[0].data[..], PNG_BYTES);
    assert_eq!(files[1].mime, "text/plain");
    assert_eq!(files[1].filename, "decrypted-1.txt");
    assert_eq!(&files[1].data[..], TEXT_BYTES);

    // Both files are addressable until their handles drop
    assert_eq!(retriever.registry().len(), 2);
    let url = files[0].url().to_string();
    assert!(retriever.registry().resolve(&url).is_some());
    drop(files);
    assert!(retriever.registry().is_empty());
}

#[tokio::test]
async fn test_all_downloads_fail_skips_key_fetch() {
    let fixture = TestFixture::new();
    let a = blob_id("a");
    let b = blob_id("b");
    fixture.store.fail(a.clone());

    let session = fixture.session_for(&fixture.member);
    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[a, b], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::NoBlobsRetrievable));
    assert!(fixture.keys.fetch_calls().is_empty());
    assert!(fixture.ledger.built_batches().is_empty());
}

#[tokio::test]
async fn test_empty_input_is_no_blobs() {
    let fixture = TestFixture::new();
    let session = fixture.session_for(&fixture.member);

    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::NoBlobsRetrievable));
    assert_eq!(fixture.store.get_count(), 0);
    assert!(fixture.keys.fetch_calls().is_empty());
}

#[tokio::test]
async fn test_keys_fetched_in_batches_of_ten() {
    let fixture = TestFixture::new();
    let mut ids = Vec::new();
    for n in 0..15 {
        ids.push(fixture.put_encrypted(&format!("file-{:02}", n), TEXT_BYTES).await);
    }

    let session = fixture.session_for(&fixture.member);
    let files = fixture
        .retriever()
        .retrieve_and_decrypt(&ids, &session, &fixture.approval())
        .await
        .unwrap();

    let calls = fixture.keys.fetch_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].len(), 10);
    assert_eq!(calls[1].len(), 5);
    assert_eq!(files.len(), 15);
    assert_eq!(fixture.keys.decrypt_count(), 15);

    // Batches are in input order
    assert!(calls[0][0]
        .as_bytes()
        .ends_with(b"file-00"));
    assert!(calls[1][4].as_bytes().ends_with(b"file-14"));
}

#[tokio::test]
async fn test_failed_first_batch_stops_everything() {
    let fixture = TestFixture::new();
    let mut ids = Vec::new();
    for n in 0..15 {
        ids.push(fixture.put_encrypted(&format!("file-{:02}", n), TEXT_BYTES).await);
    }
    fixture.keys.fail_fetch_call(0);

    let session = fixture.session_for(&fixture.member);
    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&ids, &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::DecryptionUnavailable(_)));
    assert_eq!(fixture.keys.fetch_calls().len(), 1);
    assert_eq!(fixture.keys.decrypt_count(), 0);
}

#[tokio::test]
async fn test_denied_second_batch_discards_first() {
    let fixture = TestFixture::new();
    let mut ids = Vec::new();
    for n in 0..10 {
        ids.push(fixture.put_encrypted(&format!("good-{:02}", n), TEXT_BYTES).await);
    }

    // Encrypted under a policy the approval call does not cover
    let foreign = ObjectId::from_bytes([0x77; 32]);
    for n in 0..5 {
        let name = format!("foreign-{:02}", n);
        let id = FullId::for_policy(&foreign, name.as_bytes());
        let envelope = fixture
            .keys
            .encrypt(&fixture.package_id, &id, 2, TEXT_BYTES)
            .await
            .unwrap();
        let blob = blob_id(&name);
        fixture.store.insert(blob.clone(), envelope);
        ids.push(blob);
    }

    let session = fixture.session_for(&fixture.member);
    let retriever = fixture.retriever();
    let err = retriever
        .retrieve_and_decrypt(&ids, &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::AccessDenied(_)));
    assert_eq!(fixture.keys.fetch_calls().len(), 2);
    assert_eq!(fixture.keys.decrypt_count(), 0);
    assert!(retriever.registry().is_empty());
}

#[tokio::test]
async fn test_outsider_is_denied_without_decrypting() {
    let fixture = TestFixture::new();
    let blob = fixture.put_encrypted("secret", TEXT_BYTES).await;

    let session = fixture.session_for(&fixture.outsider);
    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[blob], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::AccessDenied(_)));
    assert_eq!(err.user_message(), "No access to decryption keys");
    assert_eq!(fixture.keys.decrypt_count(), 0);
}

#[tokio::test]
async fn test_wrong_policy_object_is_denied() {
    let fixture = TestFixture::new();
    let blob = fixture.put_encrypted("secret", TEXT_BYTES).await;
    let (other_list, _) =
        fixture
            .ledger
            .seed_allowlist(&fixture.owner.address(), "other", &[fixture.member.address()]);

    // Membership elsewhere does not unlock this allowlist's files
    let approval = ApprovalCallBuilder::new(fixture.package_id, other_list);
    let session = fixture.session_for(&fixture.member);
    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[blob], &session, &approval)
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::AccessDenied(_)));
}

#[tokio::test]
async fn test_unparseable_envelope_is_unavailable() {
    let fixture = TestFixture::new();
    let good = fixture.put_encrypted("good", TEXT_BYTES).await;
    let raw = fixture.put_raw("raw", b"not an envelope at all");

    let session = fixture.session_for(&fixture.member);
    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[good, raw], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::DecryptionUnavailable(_)));
    assert!(fixture.keys.fetch_calls().is_empty());
}

#[tokio::test]
async fn test_decrypt_failure_returns_no_partial_results() {
    let fixture = TestFixture::new();
    let a = fixture.put_encrypted("a", TEXT_BYTES).await;
    let b = fixture.put_encrypted("b", PNG_BYTES).await;
    fixture.keys.fail_decrypts(true);

    let session = fixture.session_for(&fixture.member);
    let retriever = fixture.retriever();
    let err = retriever
        .retrieve_and_decrypt(&[a, b], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::DecryptionUnavailable(_)));
    assert_eq!(err.user_message(), "Unable to decrypt files, try again");
    assert_eq!(fixture.keys.decrypt_count(), 1);
    assert!(retriever.registry().is_empty());
}

#[tokio::test]
async fn test_ledger_build_failure_is_unavailable() {
    let fixture = TestFixture::new();
    let blob = fixture.put_encrypted("a", TEXT_BYTES).await;
    fixture.ledger.fail_builds(true);

    let session = fixture.session_for(&fixture.member);
    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[blob], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::DecryptionUnavailable(_)));
    assert!(fixture.keys.fetch_calls().is_empty());
}

#[tokio::test]
async fn test_slow_download_times_out_and_is_dropped() {
    let fixture = TestFixture::new();
    let fast = fixture.put_encrypted("fast", TEXT_BYTES).await;
    let slow = fixture.put_encrypted("slow", PNG_BYTES).await;
    fixture.store.delay(slow.clone(), Duration::from_secs(30));

    let config = RetrievalConfig {
        download_timeout: Duration::from_millis(50),
        ..RetrievalConfig::default()
    };
    let session = fixture.session_for(&fixture.member);
    let files = fixture
        .retriever_with(config)
        .retrieve_and_decrypt(&[slow, fast], &session, &fixture.approval())
        .await
        .unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "decrypted-0.txt");
}

#[tokio::test]
async fn test_approval_batches_match_key_requests() {
    let fixture = TestFixture::new();
    let a = fixture.put_encrypted("a", TEXT_BYTES).await;
    let b = fixture.put_encrypted("b", TEXT_BYTES).await;

    let session = fixture.session_for(&fixture.member);
    fixture
        .retriever()
        .retrieve_and_decrypt(&[a, b], &session, &fixture.approval())
        .await
        .unwrap();

    // One batch for the key fetch, then one single-call batch per decrypt
    let built = fixture.ledger.built_batches();
    let sizes: Vec<usize> = built.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![2, 1, 1]);
}

#[tokio::test]
async fn test_completion_signalled_once_per_success() {
    let fixture = TestFixture::new();
    let blob = fixture.put_encrypted("a", TEXT_BYTES).await;
    let session = fixture.session_for(&fixture.member);
    let retriever = fixture.retriever();
    let mut completed = retriever.subscribe();

    assert_eq!(*completed.borrow(), 0);

    retriever
        .retrieve_and_decrypt(&[blob.clone()], &session, &fixture.approval())
        .await
        .unwrap();
    assert!(completed.has_changed().unwrap());
    assert_eq!(*completed.borrow_and_update(), 1);

    // Failures do not signal
    let _ = retriever
        .retrieve_and_decrypt(&[blob_id("missing")], &session, &fixture.approval())
        .await;
    assert!(!completed.has_changed().unwrap());

    // Re-invocation repeats the work
    retriever
        .retrieve_and_decrypt(&[blob], &session, &fixture.approval())
        .await
        .unwrap();
    assert_eq!(*completed.borrow_and_update(), 2);
    assert_eq!(fixture.keys.fetch_calls().len(), 2);
}

#[tokio::test]
async fn test_unsigned_session_cannot_fetch_keys() {
    let fixture = TestFixture::new();
    let blob = fixture.put_encrypted("a", TEXT_BYTES).await;
    let session = allowvault_perms::Session::new(
        fixture.member.address(),
        fixture.package_id,
        10,
        allowvault_testkit::NOW_MS,
    )
    .unwrap();

    let err = fixture
        .retriever()
        .retrieve_and_decrypt(&[blob], &session, &fixture.approval())
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::DecryptionUnavailable(_)));
}
