//! Ledger call batches.
//!
//! A [`CallBatch`] is an ordered list of Move calls that will be executed as
//! one transaction. Batches are plain data: the ledger client turns them into
//! transaction bytes, and the key service inspects those bytes to decide
//! whether to release keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use allowvault_core::{Address, ObjectId};

use crate::error::{PermsError, Result};

/// An argument to a Move call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    /// Raw bytes passed as `vector<u8>`.
    Pure(Vec<u8>),
    /// A ledger object passed by reference.
    Object(ObjectId),
    /// An account address.
    Address(Address),
    /// A UTF-8 string.
    String(String),
}

/// A single Move call: `{package}::{module}::{function}(arguments...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub arguments: Vec<CallArg>,
}

impl MoveCall {
    /// Create a call.
    pub fn new(
        package: ObjectId,
        module: impl Into<String>,
        function: impl Into<String>,
        arguments: Vec<CallArg>,
    ) -> Self {
        Self {
            package,
            module: module.into(),
            function: function.into(),
            arguments,
        }
    }

    /// Whether this call targets `{package}::{module}::{function}`.
    pub fn is_target(&self, package: &ObjectId, module: &str, function: &str) -> bool {
        &self.package == package && self.module == module && self.function == function
    }
}

impl fmt::Display for MoveCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

/// An ordered batch of Move calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallBatch {
    calls: Vec<MoveCall>,
}

impl CallBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call.
    pub fn push(&mut self, call: MoveCall) {
        self.calls.push(call);
    }

    pub fn calls(&self) -> &[MoveCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| PermsError::SerializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_preserves_order() {
        let pkg = ObjectId::from_bytes([1u8; 32]);
        let mut batch = CallBatch::new();
        batch.push(MoveCall::new(pkg, "m", "first", vec![]));
        batch.push(MoveCall::new(pkg, "m", "second", vec![CallArg::Pure(vec![1, 2])]));

        let decoded = CallBatch::from_bytes(&batch.to_bytes()).unwrap();
        let names: Vec<_> = decoded.calls().iter().map(|c| c.function.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_call_display() {
        let call = MoveCall::new(ObjectId::ZERO, "allowlist", "add", vec![]);
        assert!(call.to_string().ends_with("::allowlist::add"));
        assert!(call.is_target(&ObjectId::ZERO, "allowlist", "add"));
        assert!(!call.is_target(&ObjectId::ZERO, "allowlist", "remove"));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(CallBatch::from_bytes(b"\x01\x02\x03").is_err());
    }
}
