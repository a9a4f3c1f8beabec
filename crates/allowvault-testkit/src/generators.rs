//! Proptest generators for property-based testing.

use proptest::prelude::*;

use allowvault_core::{Address, BlobId, FullId, Keypair, ObjectId};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random ObjectId.
pub fn object_id() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 32]>().prop_map(ObjectId::from_bytes)
}

/// Generate an address owned by some keypair.
pub fn address() -> impl Strategy<Value = Address> {
    keypair().prop_map(|kp| kp.address())
}

/// Generate a non-empty blob id in the blob network's URL-safe alphabet.
pub fn blob_id() -> impl Strategy<Value = BlobId> {
    "[A-Za-z0-9_-]{1,44}".prop_map(|s| BlobId::new(s).unwrap())
}

/// Generate a full id in `policy`'s namespace with a 5-byte nonce.
pub fn full_id_for(policy: ObjectId) -> impl Strategy<Value = FullId> {
    any::<[u8; 5]>().prop_map(move |nonce| FullId::for_policy(&policy, &nonce))
}

/// Generate file contents of up to `max_len` bytes.
pub fn file_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate printable ASCII text of 1 to `max_len` bytes.
pub fn ascii_text(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0x20u8..=0x7E, 1..=max_len)
}
