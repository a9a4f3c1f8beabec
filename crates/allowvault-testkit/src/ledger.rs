//! In-memory ledger simulator.
//!
//! Executes the allowlist module's entry points against an in-memory object
//! table, with the same ownership and membership checks the Move code
//! performs. Also records every batch it is asked to serialize, so tests can
//! assert on the approval transactions the pipeline builds.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use allowvault_core::{Address, FullId, ObjectId};
use allowvault_perms::allowlist::{ALLOWLIST_TYPE_SUFFIX, CAP_TYPE_SUFFIX};
use allowvault_perms::{
    CallArg, CallBatch, CreatedObject, LedgerClient, MoveCall, OwnedObject, PermsError, Result,
    TxEffects, ALLOWLIST_MODULE, APPROVE_FUNCTION,
};

#[derive(Debug, Clone)]
struct LedgerObject {
    type_name: String,
    /// `None` for shared objects.
    owner: Option<Address>,
    fields: Value,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    objects: HashMap<ObjectId, LedgerObject>,
    dynamic_fields: HashMap<ObjectId, Vec<String>>,
    next_object: u64,
    next_tx: u64,
}

impl LedgerState {
    fn fresh_id(&mut self) -> ObjectId {
        self.next_object += 1;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"allowvault-testkit-object");
        hasher.update(&self.next_object.to_le_bytes());
        ObjectId::from_bytes(*hasher.finalize().as_bytes())
    }

    fn members(&self, allowlist: &ObjectId) -> Option<Vec<String>> {
        let object = self.objects.get(allowlist)?;
        if !object.type_name.ends_with(ALLOWLIST_TYPE_SUFFIX) {
            return None;
        }
        serde_json::from_value(object.fields["list"].clone()).ok()
    }
}

/// An in-memory ledger running the allowlist module of one package.
pub struct MemoryLedger {
    package_id: ObjectId,
    state: Mutex<LedgerState>,
    built: Mutex<Vec<CallBatch>>,
    fail_build: Mutex<bool>,
}

impl MemoryLedger {
    pub fn new(package_id: ObjectId) -> Self {
        Self {
            package_id,
            state: Mutex::new(LedgerState::default()),
            built: Mutex::new(Vec::new()),
            fail_build: Mutex::new(false),
        }
    }

    pub fn package_id(&self) -> ObjectId {
        self.package_id
    }

    /// Create an allowlist owned by `owner` with initial `members`.
    ///
    /// Returns `(allowlist_id, cap_id)`.
    pub fn seed_allowlist(
        &self,
        owner: &Address,
        name: &str,
        members: &[Address],
    ) -> (ObjectId, ObjectId) {
        let mut state = self.state.lock().unwrap();
        let (list, cap) = create_allowlist(&mut state, &self.package_id, owner, name);
        if let Some(object) = state.objects.get_mut(&list.id) {
            object.fields["list"] = json!(members.iter().map(|m| m.to_hex()).collect::<Vec<_>>());
        }
        (list.id, cap.id)
    }

    /// Whether `address` is on `allowlist`.
    pub fn is_member(&self, allowlist: &ObjectId, address: &Address) -> bool {
        let state = self.state.lock().unwrap();
        state
            .members(allowlist)
            .map(|list| list.contains(&address.to_hex()))
            .unwrap_or(false)
    }

    /// Dry-run a batch of approval calls as `sender`.
    ///
    /// Every call must be this package's `allowlist::seal_approve` with a
    /// full id prefixed by the allowlist id, and `sender` must be a member.
    /// Returns the approved ids in order.
    pub fn dry_run_approvals(
        &self,
        batch: &CallBatch,
        sender: &Address,
    ) -> std::result::Result<Vec<FullId>, String> {
        let state = self.state.lock().unwrap();
        let mut approved = Vec::with_capacity(batch.len());

        for call in batch.calls() {
            if !call.is_target(&self.package_id, ALLOWLIST_MODULE, APPROVE_FUNCTION) {
                return Err(format!("unexpected call {}", call));
            }
            let (id, allowlist) = match call.arguments.as_slice() {
                [CallArg::Pure(id), CallArg::Object(allowlist)] => {
                    (FullId::from_bytes(id.clone()), *allowlist)
                }
                _ => return Err("seal_approve: bad arguments".to_string()),
            };
            if !id.has_policy_prefix(&allowlist) {
                return Err("seal_approve: id is not in the allowlist namespace".to_string());
            }
            let members = state
                .members(&allowlist)
                .ok_or_else(|| format!("seal_approve: {} is not an allowlist", allowlist))?;
            if !members.contains(&sender.to_hex()) {
                return Err(format!("seal_approve: {} is not allowed", sender));
            }
            approved.push(id);
        }

        Ok(approved)
    }

    /// Batches passed to [`LedgerClient::build_call_batch`], in order.
    pub fn built_batches(&self) -> Vec<CallBatch> {
        self.built.lock().unwrap().clone()
    }

    /// Make [`LedgerClient::build_call_batch`] fail.
    pub fn fail_builds(&self, fail: bool) {
        *self.fail_build.lock().unwrap() = fail;
    }

    fn execute(
        &self,
        state: &mut LedgerState,
        call: &MoveCall,
        sender: &Address,
        created: &mut Vec<CreatedObject>,
    ) -> std::result::Result<(), String> {
        if call.package != self.package_id || call.module != ALLOWLIST_MODULE {
            return Err(format!("unknown module for {}", call));
        }

        match (call.function.as_str(), call.arguments.as_slice()) {
            ("create_allowlist_entry", [CallArg::String(name)]) => {
                let (list, cap) = create_allowlist(state, &self.package_id, sender, name);
                created.push(list);
                created.push(cap);
                Ok(())
            }
            ("add", [CallArg::Object(list), CallArg::Object(cap), CallArg::Address(member)]) => {
                check_cap(state, list, cap, sender)?;
                let object = state.objects.get_mut(list).ok_or("allowlist not found")?;
                let mut members: Vec<String> = serde_json::from_value(object.fields["list"].clone())
                    .map_err(|e| e.to_string())?;
                if members.contains(&member.to_hex()) {
                    return Err("add: duplicate member".to_string());
                }
                members.push(member.to_hex());
                object.fields["list"] = json!(members);
                Ok(())
            }
            ("remove", [CallArg::Object(list), CallArg::Object(cap), CallArg::Address(member)]) => {
                check_cap(state, list, cap, sender)?;
                let object = state.objects.get_mut(list).ok_or("allowlist not found")?;
                let mut members: Vec<String> = serde_json::from_value(object.fields["list"].clone())
                    .map_err(|e| e.to_string())?;
                members.retain(|m| m != &member.to_hex());
                object.fields["list"] = json!(members);
                Ok(())
            }
            (
                "publish",
                [CallArg::Object(list), CallArg::Object(cap), CallArg::String(blob_id)],
            ) => {
                check_cap(state, list, cap, sender)?;
                state
                    .dynamic_fields
                    .entry(*list)
                    .or_default()
                    .push(blob_id.clone());
                Ok(())
            }
            _ => Err(format!("cannot execute {}", call)),
        }
    }
}

fn create_allowlist(
    state: &mut LedgerState,
    package_id: &ObjectId,
    owner: &Address,
    name: &str,
) -> (CreatedObject, CreatedObject) {
    let list_id = state.fresh_id();
    let cap_id = state.fresh_id();
    let list_type = format!("{}{}", package_id, ALLOWLIST_TYPE_SUFFIX);
    let cap_type = format!("{}{}", package_id, CAP_TYPE_SUFFIX);

    state.objects.insert(
        list_id,
        LedgerObject {
            type_name: list_type.clone(),
            owner: None,
            fields: json!({ "name": name, "list": [] }),
        },
    );
    state.objects.insert(
        cap_id,
        LedgerObject {
            type_name: cap_type.clone(),
            owner: Some(*owner),
            fields: json!({ "allowlist_id": list_id.to_hex() }),
        },
    );

    (
        CreatedObject {
            id: list_id,
            type_name: list_type,
            shared: true,
        },
        CreatedObject {
            id: cap_id,
            type_name: cap_type,
            shared: false,
        },
    )
}

fn check_cap(
    state: &LedgerState,
    list: &ObjectId,
    cap: &ObjectId,
    sender: &Address,
) -> std::result::Result<(), String> {
    let cap_object = state.objects.get(cap).ok_or("cap not found")?;
    if cap_object.owner.as_ref() != Some(sender) {
        return Err("cap is not owned by sender".to_string());
    }
    if cap_object.fields["allowlist_id"] != json!(list.to_hex()) {
        return Err("invalid cap".to_string());
    }
    Ok(())
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn read_object(&self, id: &ObjectId) -> Result<Value> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(id)
            .map(|object| object.fields.clone())
            .ok_or_else(|| PermsError::ObjectNotFound(id.to_hex()))
    }

    async fn dynamic_field_names(&self, parent: &ObjectId) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.dynamic_fields.get(parent).cloned().unwrap_or_default())
    }

    async fn owned_objects(&self, owner: &Address, type_suffix: &str) -> Result<Vec<OwnedObject>> {
        let state = self.state.lock().unwrap();
        let mut owned: Vec<OwnedObject> = state
            .objects
            .iter()
            .filter(|(_, o)| o.owner.as_ref() == Some(owner) && o.type_name.ends_with(type_suffix))
            .map(|(id, o)| OwnedObject {
                id: *id,
                type_name: o.type_name.clone(),
                fields: o.fields.clone(),
            })
            .collect();
        owned.sort_by_key(|o| o.id);
        Ok(owned)
    }

    async fn build_call_batch(&self, batch: &CallBatch) -> Result<Vec<u8>> {
        if *self.fail_build.lock().unwrap() {
            return Err(PermsError::Ledger("transaction build failed".to_string()));
        }
        self.built.lock().unwrap().push(batch.clone());
        Ok(batch.to_bytes())
    }

    async fn submit(
        &self,
        batch: &CallBatch,
        sender: &Address,
        gas_budget: u64,
    ) -> Result<TxEffects> {
        if gas_budget == 0 {
            return Err(PermsError::Ledger("insufficient gas".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        // Execute against a copy so an abort leaves no partial effects
        let mut next = state.clone();
        let mut created = Vec::new();

        for call in batch.calls() {
            self.execute(&mut next, call, sender, &mut created)
                .map_err(|reason| PermsError::Ledger(format!("transaction aborted: {}", reason)))?;
        }

        next.next_tx += 1;
        let digest = format!("tx{:08}", next.next_tx);
        *state = next;

        Ok(TxEffects { digest, created })
    }
}
