//! Vault configuration.

use serde::{Deserialize, Serialize};

use allowvault_access::{RetrievalConfig, UploadConfig};
use allowvault_core::ObjectId;
use allowvault_perms::SessionConfig;

/// Configuration for [`Vault`](crate::Vault).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Package holding the allowlist module.
    pub package_id: ObjectId,
    /// Gas budget for submitted transactions.
    pub gas_budget: u64,
    pub session: SessionConfig,
    pub retrieval: RetrievalConfig,
    pub upload: UploadConfig,
}

impl VaultConfig {
    /// Default settings for a deployed package.
    pub fn new(package_id: ObjectId) -> Self {
        Self {
            package_id,
            ..Self::default()
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            package_id: ObjectId::ZERO,
            gas_budget: 10_000_000,
            session: SessionConfig::default(),
            retrieval: RetrievalConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}
