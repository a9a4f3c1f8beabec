//! Policy approval calls.
//!
//! Before releasing a key for a ciphertext, the key service dry-runs a
//! transaction that must call the policy's `seal_approve` entry point for
//! the ciphertext's full id. The call aborts unless the caller is allowed.

use allowvault_core::{FullId, ObjectId};

use crate::calls::{CallArg, CallBatch, MoveCall};

/// Move module holding the allowlist policy.
pub const ALLOWLIST_MODULE: &str = "allowlist";

/// Entry point the key service requires for key release.
pub const APPROVE_FUNCTION: &str = "seal_approve";

/// Appends `seal_approve(id, policy)` calls for one policy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalCallBuilder {
    package_id: ObjectId,
    policy_id: ObjectId,
}

impl ApprovalCallBuilder {
    pub fn new(package_id: ObjectId, policy_id: ObjectId) -> Self {
        Self {
            package_id,
            policy_id,
        }
    }

    pub fn package_id(&self) -> &ObjectId {
        &self.package_id
    }

    pub fn policy_id(&self) -> &ObjectId {
        &self.policy_id
    }

    /// Append exactly one approval call for `id` to `batch`.
    pub fn append(&self, batch: &mut CallBatch, id: &FullId) {
        batch.push(MoveCall::new(
            self.package_id,
            ALLOWLIST_MODULE,
            APPROVE_FUNCTION,
            vec![
                CallArg::Pure(id.as_bytes().to_vec()),
                CallArg::Object(self.policy_id),
            ],
        ));
    }

    /// Build a batch approving each id in order.
    pub fn batch_for<'a>(&self, ids: impl IntoIterator<Item = &'a FullId>) -> CallBatch {
        let mut batch = CallBatch::new();
        for id in ids {
            self.append(&mut batch, id);
        }
        batch
    }
}
