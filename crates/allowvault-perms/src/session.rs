//! Time-boxed decryption sessions.
//!
//! A session delegates decryption authority from a wallet account to an
//! ephemeral keypair for a limited time, scoped to one package. The wallet
//! signs a personal message naming the ephemeral public key; after that the
//! ephemeral key signs key requests on the wallet's behalf.
//!
//! ## Lifecycle
//!
//! 1. [`Session::new`] creates an unsigned session
//! 2. The wallet signs [`Session::personal_message`]
//! 3. [`Session::set_personal_message_signature`] attaches and verifies it
//! 4. [`Session::export`] serializes it for the session cache
//!
//! Validity is re-checked on every use ([`Session::is_valid_for`]); there is
//! no revocation, a superseded session is simply discarded.

use std::fmt;

use serde::{Deserialize, Serialize};

use allowvault_core::{Address, Ed25519PublicKey, Ed25519Signature, Keypair, ObjectId};

use crate::error::{PermsError, Result};
use crate::signer::WalletSignature;

/// Version tag written into every export.
const EXPORT_VERSION: u8 = 1;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// A decryption session bound to one address and one package.
#[derive(Clone)]
pub struct Session {
    address: Address,
    package_id: ObjectId,
    creation_time_ms: i64,
    ttl_min: u32,
    ephemeral: Keypair,
    signature: Option<WalletSignature>,
}

/// Proof handed to the key service that a session was authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCertificate {
    /// Account that delegated authority.
    pub user: Address,
    /// Ephemeral key that signs requests.
    pub session_key: Ed25519PublicKey,
    /// Creation time (Unix ms).
    pub creation_time_ms: i64,
    /// Lifetime in minutes.
    pub ttl_min: u32,
    /// Wallet signature over the personal message.
    pub signature: WalletSignature,
}

impl SessionCertificate {
    /// Rebuild the personal message this certificate vouches for.
    pub fn personal_message(&self, package_id: &ObjectId) -> Vec<u8> {
        personal_message(package_id, self.ttl_min, self.creation_time_ms, &self.session_key)
    }

    /// Check that the certificate is signed by `user` and covers `package_id`.
    pub fn verify(&self, package_id: &ObjectId) -> Result<()> {
        verify_wallet_signature(
            &self.user,
            &self.personal_message(package_id),
            &self.signature,
        )
    }
}

/// Serialized form kept in the session cache.
#[derive(Serialize, Deserialize)]
struct SessionExport {
    version: u8,
    address: Address,
    package_id: ObjectId,
    creation_time_ms: i64,
    ttl_min: u32,
    session_seed: [u8; 32],
    signature: Option<WalletSignature>,
}

impl Session {
    /// Create an unsigned session with a fresh ephemeral key.
    pub fn new(address: Address, package_id: ObjectId, ttl_min: u32, now_ms: i64) -> Result<Self> {
        Self::with_keypair(address, package_id, ttl_min, now_ms, Keypair::generate())
    }

    /// Create an unsigned session around a given ephemeral key.
    pub fn with_keypair(
        address: Address,
        package_id: ObjectId,
        ttl_min: u32,
        now_ms: i64,
        ephemeral: Keypair,
    ) -> Result<Self> {
        if ttl_min == 0 {
            return Err(PermsError::InvalidSession(
                "ttl must be at least one minute".to_string(),
            ));
        }

        Ok(Self {
            address,
            package_id,
            creation_time_ms: now_ms,
            ttl_min,
            ephemeral,
            signature: None,
        })
    }

    /// The account this session acts for.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The package whose policies this session may invoke.
    pub fn package_id(&self) -> &ObjectId {
        &self.package_id
    }

    pub fn creation_time_ms(&self) -> i64 {
        self.creation_time_ms
    }

    pub fn ttl_min(&self) -> u32 {
        self.ttl_min
    }

    /// First instant (Unix ms) at which the session is no longer valid.
    pub fn expires_at_ms(&self) -> i64 {
        self.creation_time_ms + i64::from(self.ttl_min) * MILLIS_PER_MINUTE
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Whether this session may be reused for `address` under `package_id`.
    pub fn is_valid_for(&self, address: &Address, package_id: &ObjectId, now_ms: i64) -> bool {
        self.is_signed()
            && !self.is_expired(now_ms)
            && &self.address == address
            && &self.package_id == package_id
    }

    /// Public half of the ephemeral key.
    pub fn session_key(&self) -> Ed25519PublicKey {
        self.ephemeral.public_key()
    }

    /// The message the wallet must sign to activate this session.
    pub fn personal_message(&self) -> Vec<u8> {
        personal_message(
            &self.package_id,
            self.ttl_min,
            self.creation_time_ms,
            &self.ephemeral.public_key(),
        )
    }

    /// Attach the wallet's signature over [`Self::personal_message`].
    ///
    /// The signature must come from the session's own address.
    pub fn set_personal_message_signature(&mut self, signature: WalletSignature) -> Result<()> {
        verify_wallet_signature(&self.address, &self.personal_message(), &signature)?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Certificate for the key service. Fails until the session is signed.
    pub fn certificate(&self) -> Result<SessionCertificate> {
        let signature = self.signature.ok_or(PermsError::SessionNotSigned)?;
        Ok(SessionCertificate {
            user: self.address,
            session_key: self.ephemeral.public_key(),
            creation_time_ms: self.creation_time_ms,
            ttl_min: self.ttl_min,
            signature,
        })
    }

    /// Sign a key request with the ephemeral key.
    pub fn sign_request(&self, request: &[u8]) -> Ed25519Signature {
        self.ephemeral.sign(request)
    }

    /// Serialize for the session cache.
    ///
    /// The export includes the ephemeral secret, so an imported session can
    /// keep signing requests.
    pub fn export(&self) -> Vec<u8> {
        let export = SessionExport {
            version: EXPORT_VERSION,
            address: self.address,
            package_id: self.package_id,
            creation_time_ms: self.creation_time_ms,
            ttl_min: self.ttl_min,
            session_seed: self.ephemeral.seed(),
            signature: self.signature,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&export, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Reconstruct a session from [`Self::export`] output.
    ///
    /// Any decoding problem, unknown version, or signature that does not
    /// verify is reported as [`PermsError::CacheCorrupt`].
    pub fn import(bytes: &[u8]) -> Result<Self> {
        let export: SessionExport =
            ciborium::from_reader(bytes).map_err(|e| PermsError::CacheCorrupt(e.to_string()))?;

        if export.version != EXPORT_VERSION {
            return Err(PermsError::CacheCorrupt(format!(
                "unsupported export version {}",
                export.version
            )));
        }

        let mut session = Self::with_keypair(
            export.address,
            export.package_id,
            export.ttl_min,
            export.creation_time_ms,
            Keypair::from_seed(&export.session_seed),
        )
        .map_err(|e| PermsError::CacheCorrupt(e.to_string()))?;

        if let Some(signature) = export.signature {
            session
                .set_personal_message_signature(signature)
                .map_err(|e| PermsError::CacheCorrupt(e.to_string()))?;
        }

        Ok(session)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("package_id", &self.package_id)
            .field("creation_time_ms", &self.creation_time_ms)
            .field("ttl_min", &self.ttl_min)
            .field("session_key", &self.ephemeral.public_key())
            .field("signed", &self.is_signed())
            .finish()
    }
}

fn personal_message(
    package_id: &ObjectId,
    ttl_min: u32,
    creation_time_ms: i64,
    session_key: &Ed25519PublicKey,
) -> Vec<u8> {
    format!(
        "Accessing keys of package {} for {} mins from {}, session key {}",
        package_id,
        ttl_min,
        creation_time_ms,
        session_key.to_hex()
    )
    .into_bytes()
}

fn verify_wallet_signature(
    expected: &Address,
    message: &[u8],
    signature: &WalletSignature,
) -> Result<()> {
    let signer = signature.signer_address();
    if &signer != expected {
        return Err(PermsError::AuthDenied(format!(
            "signature is from {}, expected {}",
            signer, expected
        )));
    }

    signature
        .public_key
        .verify(message, &signature.signature)
        .map_err(|e| PermsError::AuthDenied(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000_000;

    fn wallet() -> Keypair {
        Keypair::from_seed(&[1u8; 32])
    }

    fn package() -> ObjectId {
        ObjectId::from_bytes([7u8; 32])
    }

    fn signed_session(wallet: &Keypair) -> Session {
        let mut session = Session::new(wallet.address(), package(), 10, NOW).unwrap();
        let sig = WalletSignature {
            public_key: wallet.public_key(),
            signature: wallet.sign(&session.personal_message()),
        };
        session.set_personal_message_signature(sig).unwrap();
        session
    }

    #[test]
    fn test_expiry_boundary() {
        let session = signed_session(&wallet());
        let expiry = NOW + 10 * 60_000;

        assert_eq!(session.expires_at_ms(), expiry);
        assert!(!session.is_expired(expiry - 1));
        assert!(session.is_expired(expiry));
    }

    #[test]
    fn test_unsigned_session_is_not_valid() {
        let w = wallet();
        let session = Session::new(w.address(), package(), 10, NOW).unwrap();

        assert!(!session.is_valid_for(&w.address(), &package(), NOW));
        assert!(matches!(session.certificate(), Err(PermsError::SessionNotSigned)));
    }

    #[test]
    fn test_valid_for_checks_address_and_package() {
        let w = wallet();
        let session = signed_session(&w);
        let other = Keypair::from_seed(&[2u8; 32]).address();

        assert!(session.is_valid_for(&w.address(), &package(), NOW));
        assert!(!session.is_valid_for(&other, &package(), NOW));
        assert!(!session.is_valid_for(&w.address(), &ObjectId::ZERO, NOW));
    }

    #[test]
    fn test_signature_from_other_account_rejected() {
        let w = wallet();
        let imposter = Keypair::from_seed(&[3u8; 32]);
        let mut session = Session::new(w.address(), package(), 10, NOW).unwrap();

        let sig = WalletSignature {
            public_key: imposter.public_key(),
            signature: imposter.sign(&session.personal_message()),
        };
        assert!(matches!(
            session.set_personal_message_signature(sig),
            Err(PermsError::AuthDenied(_))
        ));
        assert!(!session.is_signed());
    }

    #[test]
    fn test_signature_over_wrong_message_rejected() {
        let w = wallet();
        let mut session = Session::new(w.address(), package(), 10, NOW).unwrap();

        let sig = WalletSignature {
            public_key: w.public_key(),
            signature: w.sign(b"something else"),
        };
        assert!(session.set_personal_message_signature(sig).is_err());
    }

    #[test]
    fn test_export_import_preserves_session() {
        let session = signed_session(&wallet());
        let restored = Session::import(&session.export()).unwrap();

        assert_eq!(restored.address(), session.address());
        assert_eq!(restored.package_id(), session.package_id());
        assert_eq!(restored.creation_time_ms(), session.creation_time_ms());
        assert_eq!(restored.session_key(), session.session_key());
        assert!(restored.is_signed());
        assert_eq!(restored.certificate().unwrap(), session.certificate().unwrap());
    }

    #[test]
    fn test_import_garbage_is_cache_corrupt() {
        assert!(matches!(
            Session::import(b"\xff\x00garbage"),
            Err(PermsError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn test_certificate_verifies() {
        let session = signed_session(&wallet());
        let cert = session.certificate().unwrap();

        cert.verify(&package()).unwrap();
        assert!(cert.verify(&ObjectId::ZERO).is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let w = wallet();
        assert!(Session::new(w.address(), package(), 0, NOW).is_err());
    }

    proptest! {
        #[test]
        fn expiry_matches_ttl(
            created in 0i64..=i64::MAX / 4,
            ttl in 1u32..=60,
            offset in 0i64..=2 * 60 * 60_000,
        ) {
            let w = wallet();
            let session =
                Session::with_keypair(w.address(), package(), ttl, created, w.clone()).unwrap();
            let now = created + offset;
            prop_assert_eq!(session.is_expired(now), offset >= i64::from(ttl) * 60_000);
        }
    }
}
