//! Ciphertext envelope.
//!
//! Everything the key service encrypts is wrapped in a self-describing CBOR
//! envelope. The header carries the package and the full id the ciphertext
//! was encrypted under, which is what approval calls and key requests are
//! built from. The blob id the envelope was stored under is unrelated.

use serde::{Deserialize, Serialize};

use allowvault_core::{FullId, ObjectId};

use crate::error::{PermsError, Result};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// A parsed ciphertext envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObject {
    /// Envelope format version.
    pub version: u8,

    /// Package whose policy governs key release.
    pub package_id: ObjectId,

    /// Identity the ciphertext was encrypted under.
    pub id: FullId,

    /// Key-server responses required to decrypt.
    pub threshold: u8,

    /// Nonce used for the symmetric layer.
    pub nonce: Vec<u8>,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedObject {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Parse an envelope, rejecting unknown versions.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let object: Self = ciborium::from_reader(bytes)
            .map_err(|e| PermsError::InvalidEnvelope(e.to_string()))?;

        if object.version != ENVELOPE_VERSION {
            return Err(PermsError::InvalidEnvelope(format!(
                "unsupported envelope version {}",
                object.version
            )));
        }

        Ok(object)
    }

    /// Get the size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}
