use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::PersistenceError;
use crate::model::{normalize_name, Call, NamedEntity, Node, User};
use crate::ops::{EntityKind, Operation};

/// The in-memory representation of the cluster's shared data.
///
/// Every map is keyed by the normalized entity name. The aggregate is only
/// ever accessed through a [StateHandle] which enforces the locking
/// discipline.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReplicatedState {
    users: BTreeMap<String, User>,
    nodes: BTreeMap<String, Node>,
    calls: Vec<Call>,
}

impl ReplicatedState {
    pub fn users(&self) -> &BTreeMap<String, User> {
        &self.users
    }

    pub fn get_user(&self, name: &str) -> Option<&User> {
        self.users.get(&normalize_name(name))
    }

    pub fn nodes(&self) -> &BTreeMap<String, Node> {
        &self.nodes
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(&normalize_name(name))
    }

    pub(crate) fn get_node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(&normalize_name(name))
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn calls_for_owner(&self, owner_name: &str) -> Vec<Call> {
        let owner = normalize_name(owner_name);
        self.calls
            .iter()
            .filter(|call| normalize_name(&call.owner_name) == owner)
            .cloned()
            .collect()
    }

    pub(crate) fn contains(&self, kind: EntityKind, normalized_name: &str) -> bool {
        match kind {
            EntityKind::User => self.users.contains_key(normalized_name),
            EntityKind::Node => self.nodes.contains_key(normalized_name),
        }
    }

    /// Applies a single operation to the state.
    ///
    /// Application is deterministic: two states which apply the same sequence
    /// of operations end up equal. Returns whether the state changed.
    pub fn apply(&mut self, op: &Operation) -> bool {
        match op {
            Operation::PutUser(user) => {
                self.users.insert(user.normalized_name(), user.clone());
                true
            },
            Operation::DeleteUser(name) => self.users.remove(&normalize_name(name)).is_some(),
            Operation::PutNode(node) => {
                self.nodes.insert(node.normalized_name(), node.clone());
                true
            },
            Operation::DeleteNode(name) => self.nodes.remove(&normalize_name(name)).is_some(),
            Operation::PutCall(call) => {
                self.calls.push(call.clone());
                true
            },
        }
    }

    /// Produces the wire representation used for bulk state transfer.
    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            users: self.users.values().cloned().collect(),
            nodes: self.nodes.values().cloned().collect(),
            calls: self.calls.clone(),
        }
    }

    /// Rebuilds a state from a transferred snapshot.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let mut state = ReplicatedState::default();
        for user in snapshot.users {
            state.users.insert(user.normalized_name(), user);
        }
        for node in snapshot.nodes {
            state.nodes.insert(node.normalized_name(), node);
        }
        state.calls = snapshot.calls;
        state
    }
}

/// The full replicated state as sent to a newly connecting member.
#[repr(C)]
#[derive(Debug, Clone, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[archive(check_bytes)]
pub struct StateSnapshot {
    pub users: Vec<User>,
    pub nodes: Vec<Node>,
    pub calls: Vec<Call>,
}

/// A cheaply cloneable handle to the process wide replicated state.
///
/// The handle owns the single reader-writer lock guarding the state. Access
/// is scoped through closures so a guard can never be held across a call
/// that might suspend or block on the network: callers extract the derived
/// values they need, the lock is released, and only then may they act.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<StateInner>,
}

struct StateInner {
    state: RwLock<ReplicatedState>,
    snapshot_path: Option<PathBuf>,
}

impl StateHandle {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(StateInner {
                state: RwLock::new(ReplicatedState::default()),
                snapshot_path,
            }),
        }
    }

    /// Runs a closure with shared read access to the state.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ReplicatedState) -> R,
    {
        let guard = self.inner.state.read();
        f(&guard)
    }

    /// Runs a closure with exclusive write access to the state.
    pub fn with_write<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut ReplicatedState) -> R,
    {
        let mut guard = self.inner.state.write();
        f(&mut guard)
    }

    /// Replaces the whole state, used when installing a transferred snapshot.
    pub fn install(&self, state: ReplicatedState) {
        let mut guard = self.inner.state.write();
        *guard = state;
    }

    /// Loads the durable snapshot if one exists.
    ///
    /// Returns whether a snapshot was found and installed.
    pub fn load_from_disk(&self) -> Result<bool, PersistenceError> {
        let Some(path) = self.inner.snapshot_path.as_ref() else {
            return Ok(false);
        };

        if !path.exists() {
            return Ok(false);
        }

        let raw = fs::read_to_string(path)?;
        let state: ReplicatedState = serde_json::from_str(&raw)?;
        self.install(state);

        Ok(true)
    }

    /// Writes the full state to the durable snapshot file.
    ///
    /// The state is serialized under the read lock, the file write happens
    /// after the lock has been released.
    pub fn persist(&self) -> Result<(), PersistenceError> {
        let Some(path) = self.inner.snapshot_path.as_ref() else {
            return Ok(());
        };

        let raw = self.with_read(|state| serde_json::to_string_pretty(state))?;
        fs::write(path, raw)?;

        Ok(())
    }

    /// Persists the state, logging instead of failing.
    ///
    /// A failed snapshot write leaves the in-memory state correct, it will be
    /// re-attempted on the next successful write.
    pub fn persist_best_effort(&self) {
        if let Err(error) = self.persist() {
            error!(
                error = %error,
                "Failed to write the state snapshot; the in-memory state remains authoritative."
            );
        }
    }
}
