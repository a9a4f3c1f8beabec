//! Session acquisition with caching.
//!
//! The manager reuses the cached session while it stays valid and only asks
//! the wallet for a new signature when it must.

use serde::{Deserialize, Serialize};

use allowvault_core::{Address, ObjectId};
use allowvault_store::{SessionCache, SESSION_SLOT};

use crate::error::{PermsError, Result};
use crate::session::Session;
use crate::signer::Signer;

/// Configuration for [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of newly created sessions, in minutes.
    pub ttl_min: u32,
    /// Cache slot holding the serialized session.
    pub cache_slot: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_min: 10,
            cache_slot: SESSION_SLOT.to_string(),
        }
    }
}

/// Obtains sessions, consulting the cache first.
///
/// Concurrent calls for the same address are not serialized; each may
/// prompt the signer, and the last write to the slot wins.
pub struct SessionManager<C: SessionCache> {
    cache: C,
    config: SessionConfig,
}

impl<C: SessionCache> SessionManager<C> {
    /// Create a manager over a cache.
    pub fn new(cache: C, config: SessionConfig) -> Self {
        Self { cache, config }
    }

    /// Get the cache reference.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Return a signed session for `address` under `package_id`.
    ///
    /// A cached session is returned as-is when it is signed, unexpired at
    /// `now_ms`, and bound to the same address and package. Otherwise the
    /// slot is cleared, a new session is created, and `signer` is asked to
    /// sign it. On success the new session is written back to the slot.
    ///
    /// # Errors
    ///
    /// [`PermsError::AuthDenied`] when the signer refuses or its signature
    /// does not verify. The slot is left empty in that case.
    pub async fn obtain_session<S: Signer + ?Sized>(
        &self,
        address: &Address,
        package_id: &ObjectId,
        signer: &S,
        now_ms: i64,
    ) -> Result<Session> {
        if let Some(cached) = self.load_cached().await? {
            if cached.is_valid_for(address, package_id, now_ms) {
                tracing::debug!(address = %address, "session cache hit");
                return Ok(cached);
            }
            tracing::debug!(
                address = %address,
                expired = cached.is_expired(now_ms),
                "cached session no longer valid"
            );
        }

        self.cache.clear(&self.config.cache_slot).await?;

        let mut session = Session::new(*address, *package_id, self.config.ttl_min, now_ms)?;

        let signature = match signer.sign_personal_message(&session.personal_message()).await {
            Ok(signature) => signature,
            Err(e) => {
                tracing::info!(address = %address, error = %e, "signer refused session");
                return Err(PermsError::AuthDenied(e.to_string()));
            }
        };

        session.set_personal_message_signature(signature)?;

        self.cache
            .store(&self.config.cache_slot, &session.export())
            .await?;

        tracing::debug!(
            address = %address,
            expires_at_ms = session.expires_at_ms(),
            "new session signed and cached"
        );
        Ok(session)
    }

    /// Drop any cached session.
    pub async fn forget(&self) -> Result<()> {
        self.cache.clear(&self.config.cache_slot).await?;
        Ok(())
    }

    /// Load and reconstruct the cached session. Corrupt payloads are misses.
    async fn load_cached(&self) -> Result<Option<Session>> {
        let Some(bytes) = self.cache.load(&self.config.cache_slot).await? else {
            tracing::debug!("session cache miss");
            return Ok(None);
        };

        match Session::import(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable cached session");
                Ok(None)
            }
        }
    }
}
