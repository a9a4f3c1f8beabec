//! Ledger client abstraction.
//!
//! Reads, transaction building, and submission against the ledger. Wallet
//! approval of submitted transactions happens behind this trait.

use async_trait::async_trait;
use serde_json::Value;

use allowvault_core::{Address, ObjectId};

use crate::calls::CallBatch;
use crate::error::Result;

/// An object created by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedObject {
    pub id: ObjectId,
    /// Fully qualified Move type, e.g. `0x..::allowlist::Allowlist`.
    pub type_name: String,
    /// Whether the object is shared (as opposed to owned).
    pub shared: bool,
}

/// What a submitted transaction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEffects {
    pub digest: String,
    pub created: Vec<CreatedObject>,
}

impl TxEffects {
    /// The first created object whose type ends with `suffix`.
    pub fn created_of_type(&self, suffix: &str) -> Option<&CreatedObject> {
        self.created.iter().find(|o| o.type_name.ends_with(suffix))
    }
}

/// An object owned by an account.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedObject {
    pub id: ObjectId,
    pub type_name: String,
    pub fields: Value,
}

/// Ledger operations used by allowvault.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Read an object's fields as JSON.
    ///
    /// Returns [`PermsError::ObjectNotFound`](crate::PermsError::ObjectNotFound)
    /// if the object does not exist.
    async fn read_object(&self, id: &ObjectId) -> Result<Value>;

    /// Names of the dynamic fields attached to `parent`.
    async fn dynamic_field_names(&self, parent: &ObjectId) -> Result<Vec<String>>;

    /// Objects owned by `owner` whose type ends with `type_suffix`.
    async fn owned_objects(&self, owner: &Address, type_suffix: &str) -> Result<Vec<OwnedObject>>;

    /// Serialize a batch as transaction-kind bytes (no gas, no sender).
    async fn build_call_batch(&self, batch: &CallBatch) -> Result<Vec<u8>>;

    /// Sign and execute a batch as `sender`.
    async fn submit(
        &self,
        batch: &CallBatch,
        sender: &Address,
        gas_budget: u64,
    ) -> Result<TxEffects>;
}
