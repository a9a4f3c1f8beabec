//! In-memory key service.
//!
//! Stands in for the threshold key servers. Content keys are derived from a
//! master secret and the full id, so anything this server encrypted it can
//! later decrypt. Keys are released only to signed sessions whose approval
//! transaction passes the ledger's `seal_approve` dry run.
//!
//! Every call is recorded, and failures can be injected per call.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

use allowvault_access::{KeyService, KeyServiceError};
use allowvault_core::{Ed25519PublicKey, FullId, ObjectId};
use allowvault_perms::{CallBatch, EncryptedObject, Session, ENVELOPE_VERSION};

use crate::ledger::MemoryLedger;

const NONCE_LEN: usize = 12;

#[derive(Default)]
struct ServerState {
    fetch_calls: Vec<Vec<FullId>>,
    decrypt_calls: usize,
    released: HashSet<(Ed25519PublicKey, FullId)>,
    fail_fetch_call: Option<usize>,
    fail_decrypts: bool,
}

/// A key service backed by a [`MemoryLedger`].
pub struct MemoryKeyServer {
    ledger: Arc<MemoryLedger>,
    master: [u8; 32],
    servers: u8,
    state: Mutex<ServerState>,
}

impl MemoryKeyServer {
    /// Create a server set of two key servers.
    pub fn new(ledger: Arc<MemoryLedger>) -> Self {
        let mut master = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut master);
        Self {
            ledger,
            master,
            servers: 2,
            state: Mutex::new(ServerState::default()),
        }
    }

    /// Ids requested by each `fetch_keys` call, in call order.
    pub fn fetch_calls(&self) -> Vec<Vec<FullId>> {
        self.state.lock().unwrap().fetch_calls.clone()
    }

    /// Number of `decrypt` calls.
    pub fn decrypt_count(&self) -> usize {
        self.state.lock().unwrap().decrypt_calls
    }

    /// Make the `n`th (zero-based) `fetch_keys` call fail as unreachable.
    pub fn fail_fetch_call(&self, n: usize) {
        self.state.lock().unwrap().fail_fetch_call = Some(n);
    }

    /// Make every `decrypt` call fail.
    pub fn fail_decrypts(&self, fail: bool) {
        self.state.lock().unwrap().fail_decrypts = fail;
    }

    fn content_key(&self, package_id: &ObjectId, id: &FullId) -> Key {
        let mut hasher = blake3::Hasher::new_keyed(&self.master);
        hasher.update(package_id.as_bytes());
        hasher.update(id.as_bytes());
        Key::from(*hasher.finalize().as_bytes())
    }

    /// Check the session and dry-run the approval transaction.
    fn authorize(
        &self,
        tx_bytes: &[u8],
        session: &Session,
    ) -> Result<Vec<FullId>, KeyServiceError> {
        let certificate = session
            .certificate()
            .map_err(|e| KeyServiceError::Other(e.to_string()))?;
        certificate
            .verify(session.package_id())
            .map_err(|e| KeyServiceError::Other(format!("invalid certificate: {}", e)))?;

        let batch = CallBatch::from_bytes(tx_bytes)
            .map_err(|e| KeyServiceError::Other(format!("invalid transaction: {}", e)))?;

        self.ledger
            .dry_run_approvals(&batch, session.address())
            .map_err(KeyServiceError::NoAccess)
    }
}

#[async_trait]
impl KeyService for MemoryKeyServer {
    async fn fetch_keys(
        &self,
        ids: &[FullId],
        tx_bytes: &[u8],
        session: &Session,
        threshold: u8,
    ) -> Result<(), KeyServiceError> {
        let call = {
            let mut state = self.state.lock().unwrap();
            state.fetch_calls.push(ids.to_vec());
            state.fetch_calls.len() - 1
        };

        if self.state.lock().unwrap().fail_fetch_call == Some(call) {
            return Err(KeyServiceError::Other("key servers unreachable".to_string()));
        }
        if threshold == 0 || threshold > self.servers {
            return Err(KeyServiceError::Other(format!(
                "threshold {} not satisfiable by {} servers",
                threshold, self.servers
            )));
        }

        let approved = self.authorize(tx_bytes, session)?;
        if let Some(missing) = ids.iter().find(|id| !approved.contains(id)) {
            return Err(KeyServiceError::NoAccess(format!("{} was not approved", missing)));
        }

        let mut state = self.state.lock().unwrap();
        let session_key = session.session_key();
        for id in ids {
            state.released.insert((session_key, id.clone()));
        }
        Ok(())
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        session: &Session,
        tx_bytes: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.decrypt_calls += 1;
            state.fail_decrypts
        };
        if fail {
            return Err(KeyServiceError::Other("decryption failed".to_string()));
        }

        let object = EncryptedObject::parse(ciphertext)
            .map_err(|e| KeyServiceError::Other(e.to_string()))?;

        let approved = self.authorize(tx_bytes, session)?;
        if !approved.contains(&object.id) {
            return Err(KeyServiceError::NoAccess(format!("{} was not approved", object.id)));
        }

        let released = self
            .state
            .lock()
            .unwrap()
            .released
            .contains(&(session.session_key(), object.id.clone()));
        if !released {
            return Err(KeyServiceError::Other(format!("no key fetched for {}", object.id)));
        }

        if object.nonce.len() != NONCE_LEN {
            return Err(KeyServiceError::Other("bad nonce".to_string()));
        }
        let cipher = ChaCha20Poly1305::new(&self.content_key(&object.package_id, &object.id));
        cipher
            .decrypt(Nonce::from_slice(&object.nonce), object.ciphertext.as_slice())
            .map_err(|_| KeyServiceError::Other("authentication failed".to_string()))
    }

    async fn encrypt(
        &self,
        package_id: &ObjectId,
        id: &FullId,
        threshold: u8,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError> {
        if threshold == 0 || threshold > self.servers {
            return Err(KeyServiceError::Other(format!(
                "threshold {} not satisfiable by {} servers",
                threshold, self.servers
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(&self.content_key(package_id, id));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| KeyServiceError::Other("encryption failed".to_string()))?;

        Ok(EncryptedObject {
            version: ENVELOPE_VERSION,
            package_id: *package_id,
            id: id.clone(),
            threshold,
            nonce: nonce.to_vec(),
            ciphertext,
        }
        .to_bytes())
    }
}
