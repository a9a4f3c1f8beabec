//! Wallet signer abstraction.
//!
//! The wallet lives outside this crate. All we need from it is the active
//! address and a signature over a personal message. Signing may wait on a
//! human for an arbitrary amount of time, and may be refused.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use allowvault_core::{Address, Ed25519PublicKey, Ed25519Signature, Keypair};

/// A wallet signature together with the key that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSignature {
    /// Public key of the signing wallet account.
    pub public_key: Ed25519PublicKey,
    /// Signature over the personal message bytes.
    pub signature: Ed25519Signature,
}

impl WalletSignature {
    /// The address of the account that signed.
    pub fn signer_address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }
}

/// Why a signer did not produce a signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The user declined.
    #[error("signing rejected: {0}")]
    Rejected(String),

    /// The wallet failed.
    #[error("signing failed: {0}")]
    Failed(String),
}

/// A connected wallet.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The currently active account.
    fn address(&self) -> Address;

    /// Sign a personal message.
    async fn sign_personal_message(
        &self,
        message: &[u8],
    ) -> std::result::Result<WalletSignature, SignerError>;
}

/// A signer backed by a local keypair. Never refuses.
#[derive(Debug, Clone)]
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    /// Wrap a keypair.
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Access the underlying keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl Signer for KeypairSigner {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    async fn sign_personal_message(
        &self,
        message: &[u8],
    ) -> std::result::Result<WalletSignature, SignerError> {
        Ok(WalletSignature {
            public_key: self.keypair.public_key(),
            signature: self.keypair.sign(message),
        })
    }
}
