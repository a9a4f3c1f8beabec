//! Scripted wallet signers.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use allowvault_core::{Address, Keypair};
use allowvault_perms::{KeypairSigner, Signer, SignerError, WalletSignature};

/// Signs with a keypair and counts how often it was asked.
pub struct CountingSigner {
    inner: KeypairSigner,
    calls: AtomicUsize,
}

impl CountingSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            inner: KeypairSigner::new(keypair),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for CountingSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_personal_message(&self, message: &[u8]) -> Result<WalletSignature, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_personal_message(message).await
    }
}

/// Refuses every request, as a user closing the wallet prompt would.
pub struct RejectingSigner {
    address: Address,
    calls: AtomicUsize,
}

impl RejectingSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for RejectingSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_personal_message(&self, _message: &[u8]) -> Result<WalletSignature, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SignerError::Rejected("user rejected the request".to_string()))
    }
}
