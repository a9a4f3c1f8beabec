//! The allowlist policy: administration calls and ledger views.
//!
//! An allowlist is a shared ledger object with a name and a list of member
//! addresses. Whoever holds its `Cap` may add and remove members and publish
//! blobs to it. Published blob ids are stored as dynamic fields of the
//! allowlist, which makes the allowlist double as a feed.

use serde::Deserialize;
use serde_json::Value;

use allowvault_core::{Address, BlobId, ObjectId};

use crate::calls::{CallArg, CallBatch, MoveCall};
use crate::error::{PermsError, Result};
use crate::ledger::{LedgerClient, OwnedObject};
use crate::policy::ALLOWLIST_MODULE;

/// Type suffix of allowlist objects.
pub const ALLOWLIST_TYPE_SUFFIX: &str = "::allowlist::Allowlist";

/// Type suffix of admin capabilities.
pub const CAP_TYPE_SUFFIX: &str = "::allowlist::Cap";

/// Builds administration calls for the allowlist module of one package.
#[derive(Debug, Clone, Copy)]
pub struct AllowlistCalls {
    package_id: ObjectId,
}

impl AllowlistCalls {
    pub fn new(package_id: ObjectId) -> Self {
        Self { package_id }
    }

    fn call(&self, function: &str, arguments: Vec<CallArg>) -> CallBatch {
        let mut batch = CallBatch::new();
        batch.push(MoveCall::new(
            self.package_id,
            ALLOWLIST_MODULE,
            function,
            arguments,
        ));
        batch
    }

    /// Create an allowlist and hand its cap to the sender.
    pub fn create(&self, name: &str) -> Result<CallBatch> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PermsError::InvalidArgument(
                "allowlist name must not be empty".to_string(),
            ));
        }
        Ok(self.call(
            "create_allowlist_entry",
            vec![CallArg::String(name.to_string())],
        ))
    }

    pub fn add(&self, allowlist: &ObjectId, cap: &ObjectId, member: &Address) -> CallBatch {
        self.call(
            "add",
            vec![
                CallArg::Object(*allowlist),
                CallArg::Object(*cap),
                CallArg::Address(*member),
            ],
        )
    }

    pub fn remove(&self, allowlist: &ObjectId, cap: &ObjectId, member: &Address) -> CallBatch {
        self.call(
            "remove",
            vec![
                CallArg::Object(*allowlist),
                CallArg::Object(*cap),
                CallArg::Address(*member),
            ],
        )
    }

    /// Attach an uploaded blob to the allowlist's feed.
    pub fn publish(&self, allowlist: &ObjectId, cap: &ObjectId, blob_id: &BlobId) -> CallBatch {
        self.call(
            "publish",
            vec![
                CallArg::Object(*allowlist),
                CallArg::Object(*cap),
                CallArg::String(blob_id.as_str().to_string()),
            ],
        )
    }
}

#[derive(Deserialize)]
struct AllowlistFields {
    name: String,
    list: Vec<String>,
}

#[derive(Deserialize)]
struct CapFields {
    allowlist_id: String,
}

/// An allowlist as read from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allowlist {
    pub id: ObjectId,
    pub name: String,
    pub members: Vec<Address>,
}

impl Allowlist {
    /// Parse from the object's JSON fields.
    pub fn from_fields(id: ObjectId, fields: &Value) -> Result<Self> {
        let malformed = |reason: String| PermsError::MalformedObject {
            id: id.to_hex(),
            reason,
        };

        let raw = AllowlistFields::deserialize(fields).map_err(|e| malformed(e.to_string()))?;
        let members = raw
            .list
            .iter()
            .map(|s| Address::from_hex(s))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| malformed(e.to_string()))?;

        Ok(Self {
            id,
            name: raw.name,
            members,
        })
    }

    /// Read an allowlist from the ledger.
    pub async fn load<L: LedgerClient + ?Sized>(ledger: &L, id: &ObjectId) -> Result<Self> {
        let fields = ledger.read_object(id).await?;
        Self::from_fields(*id, &fields)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.members.contains(address)
    }
}

/// An admin capability for one allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowlistCap {
    pub id: ObjectId,
    pub allowlist_id: ObjectId,
}

impl AllowlistCap {
    /// Parse from an owned object.
    pub fn from_owned(object: &OwnedObject) -> Result<Self> {
        let malformed = |reason: String| PermsError::MalformedObject {
            id: object.id.to_hex(),
            reason,
        };
        let raw = CapFields::deserialize(&object.fields).map_err(|e| malformed(e.to_string()))?;
        let allowlist_id =
            ObjectId::from_hex(&raw.allowlist_id).map_err(|e| malformed(e.to_string()))?;

        Ok(Self {
            id: object.id,
            allowlist_id,
        })
    }

    /// All caps held by `owner`.
    pub async fn owned_by<L: LedgerClient + ?Sized>(
        ledger: &L,
        owner: &Address,
    ) -> Result<Vec<Self>> {
        ledger
            .owned_objects(owner, CAP_TYPE_SUFFIX)
            .await?
            .iter()
            .map(Self::from_owned)
            .collect()
    }
}

/// The blobs published to an allowlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub allowlist_id: ObjectId,
    pub name: String,
    pub blob_ids: Vec<BlobId>,
}

impl Feed {
    /// Read an allowlist's feed from the ledger.
    ///
    /// Dynamic field names that are not valid blob ids are skipped.
    pub async fn load<L: LedgerClient + ?Sized>(
        ledger: &L,
        allowlist_id: &ObjectId,
    ) -> Result<Self> {
        let allowlist = Allowlist::load(ledger, allowlist_id).await?;
        let blob_ids = ledger
            .dynamic_field_names(allowlist_id)
            .await?
            .into_iter()
            .filter_map(|name| BlobId::new(name).ok())
            .collect();

        Ok(Self {
            allowlist_id: *allowlist_id,
            name: allowlist.name,
            blob_ids,
        })
    }
}
